use async_trait::async_trait;
use reqwest::Client;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::config::FederationConfig;
use crate::domain::federation::errors::FederationError;
use crate::domain::federation::models::FederatedProfile;
use crate::domain::federation::models::Group;
use crate::domain::federation::models::ProviderTokens;
use crate::domain::federation::ports::IdentityProvider;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Upper bound on `memberOf` pages followed for one sign-in.
const MAX_GROUP_PAGES: usize = 10;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    expires_in: u64,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphUser {
    id: String,
    display_name: Option<String>,
    mail: Option<String>,
    user_principal_name: Option<String>,
    mobile_phone: Option<String>,
    #[serde(default)]
    business_phones: Vec<String>,
}

impl From<GraphUser> for FederatedProfile {
    fn from(user: GraphUser) -> Self {
        Self {
            subject: user.id,
            email: user
                .mail
                .or(user.user_principal_name)
                .filter(|e| e.contains('@')),
            display_name: user.display_name,
            phone: user
                .mobile_phone
                .or_else(|| user.business_phones.into_iter().next()),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDirectoryObject {
    id: String,
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct GraphPage<T> {
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// Microsoft Entra ID (Azure AD) v2.0 endpoints plus Microsoft Graph.
pub struct AzureIdentityProvider {
    client: Client,
    authorize_endpoint: Url,
    token_endpoint: Url,
    logout_endpoint: Url,
    graph_base_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: String,
}

impl AzureIdentityProvider {
    /// # Errors
    /// * `Configuration` - Authority or tenant do not form valid endpoint URLs
    pub fn new(config: &FederationConfig) -> Result<Self, FederationError> {
        let base = format!(
            "{}/{}/oauth2/v2.0",
            config.authority.trim_end_matches('/'),
            config.tenant_id
        );
        let endpoint = |path: &str| {
            Url::parse(&format!("{}/{}", base, path))
                .map_err(|e| FederationError::Configuration(e.to_string()))
        };

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FederationError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            authorize_endpoint: endpoint("authorize")?,
            token_endpoint: endpoint("token")?,
            logout_endpoint: endpoint("logout")?,
            graph_base_url: config.graph_base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.join(" "),
        })
    }

    /// Only links under the configured Graph base receive the access token.
    fn is_graph_url(&self, url: &str) -> bool {
        url.strip_prefix(self.graph_base_url.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    async fn read_json<T: DeserializeOwned>(
        response: Response,
        call: &'static str,
    ) -> Result<T, FederationError> {
        let status = response.status();
        if !status.is_success() {
            tracing::error!(call, status = status.as_u16(), "Identity provider call failed");
            return Err(FederationError::Upstream(format!(
                "{} returned status {}",
                call,
                status.as_u16()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FederationError::Upstream(format!("{}: {}", call, e.without_url())))
    }

    async fn graph_get<T: DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
        call: &'static str,
    ) -> Result<T, FederationError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| FederationError::Upstream(format!("{}: {}", call, e.without_url())))?;

        Self::read_json(response, call).await
    }
}

#[async_trait]
impl IdentityProvider for AzureIdentityProvider {
    fn authorization_url(&self, state: &str, step_up: bool) -> Result<Url, FederationError> {
        let mut url = self.authorize_endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("response_type", "code")
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("response_mode", "query")
                .append_pair("scope", &self.scopes)
                .append_pair("state", state);
            if step_up {
                query
                    .append_pair("prompt", "login")
                    .append_pair("amr_values", "mfa");
            }
        }
        Ok(url)
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, FederationError> {
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("scope", self.scopes.as_str()),
        ];

        let response = self
            .client
            .post(self.token_endpoint.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| FederationError::Upstream(format!("token: {}", e.without_url())))?;

        let tokens: TokenResponse = Self::read_json(response, "token").await?;

        Ok(ProviderTokens {
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            token_type: tokens.token_type,
            expires_in: tokens.expires_in,
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<FederatedProfile, FederationError> {
        let url = format!(
            "{}/me?$select=id,displayName,mail,userPrincipalName,mobilePhone,businessPhones",
            self.graph_base_url
        );
        let user: GraphUser = self.graph_get(&url, access_token, "profile").await?;
        Ok(user.into())
    }

    async fn fetch_groups(&self, access_token: &str) -> Result<Vec<Group>, FederationError> {
        let mut groups = Vec::new();
        let mut next = Some(format!(
            "{}/me/memberOf?$select=id,displayName",
            self.graph_base_url
        ));

        for _ in 0..MAX_GROUP_PAGES {
            let Some(url) = next.take() else {
                break;
            };
            if !self.is_graph_url(&url) {
                tracing::warn!(link = %url, "Group page link points outside Microsoft Graph");
                return Err(FederationError::Upstream(
                    "groups page link outside the Graph base URL".to_string(),
                ));
            }
            let page: GraphPage<GraphDirectoryObject> =
                self.graph_get(&url, access_token, "groups").await?;

            groups.extend(page.value.into_iter().filter_map(|object| {
                object.display_name.map(|display_name| Group {
                    id: object.id,
                    display_name,
                })
            }));
            next = page.next_link;
        }

        Ok(groups)
    }

    fn logout_url(&self, post_logout_redirect: &str) -> Result<Url, FederationError> {
        let mut url = self.logout_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("post_logout_redirect_uri", post_logout_redirect);
        Ok(url)
    }
}
