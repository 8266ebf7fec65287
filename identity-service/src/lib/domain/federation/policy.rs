use crate::domain::federation::models::AccessDecision;
use crate::domain::federation::models::AccessPolicy;
use crate::domain::federation::models::Group;
use crate::domain::federation::models::PolicyViolation;
use crate::domain::federation::models::Role;
use crate::domain::federation::models::SignInContext;

/// Role markers in priority order; the first role with any matching group wins.
const ROLE_MARKERS: [(Role, &[&str]); 3] = [
    (Role::Guardian, &["guardian", "parent"]),
    (Role::Proxy, &["proxy"]),
    (Role::EmergencyContact, &["emergency contact", "emergency-contact", "emergencycontact"]),
];

/// Derive the portal role from group display names, case-insensitively.
pub fn derive_role(groups: &[Group]) -> Role {
    let names: Vec<String> = groups
        .iter()
        .map(|g| g.display_name.to_lowercase())
        .collect();

    ROLE_MARKERS
        .iter()
        .find(|(_, markers)| {
            names
                .iter()
                .any(|name| markers.iter().any(|marker| name.contains(marker)))
        })
        .map(|(role, _)| *role)
        .unwrap_or(Role::Patient)
}

/// Evaluate `context` against `policy`. Compliant iff no violation.
pub fn evaluate_conditional_access(policy: &AccessPolicy, context: &SignInContext) -> AccessDecision {
    let mut violations = Vec::new();

    if policy.require_mfa && !context.mfa_completed {
        violations.push(PolicyViolation::MfaRequired);
    }
    if policy.require_compliant_device && !context.device_compliant {
        violations.push(PolicyViolation::CompliantDeviceRequired);
    }
    if policy.block_legacy_authentication && context.legacy_authentication {
        violations.push(PolicyViolation::LegacyAuthenticationBlocked);
    }

    AccessDecision {
        compliant: violations.is_empty(),
        violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(names: &[&str]) -> Vec<Group> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Group {
                id: i.to_string(),
                display_name: name.to_string(),
            })
            .collect()
    }

    fn strict() -> AccessPolicy {
        AccessPolicy {
            require_mfa: true,
            require_compliant_device: true,
            block_legacy_authentication: true,
            require_step_up: false,
        }
    }

    #[test]
    fn test_role_defaults_to_patient() {
        assert_eq!(derive_role(&[]), Role::Patient);
        assert_eq!(derive_role(&groups(&["Cardiology Staff"])), Role::Patient);
    }

    #[test]
    fn test_role_matching_is_case_insensitive() {
        assert_eq!(derive_role(&groups(&["PARENT-Portal"])), Role::Guardian);
        assert_eq!(derive_role(&groups(&["Patient Proxy Users"])), Role::Proxy);
        assert_eq!(
            derive_role(&groups(&["Emergency Contact List"])),
            Role::EmergencyContact
        );
    }

    #[test]
    fn test_role_priority_order() {
        assert_eq!(
            derive_role(&groups(&["emergency contact", "proxy", "guardians"])),
            Role::Guardian
        );
        assert_eq!(
            derive_role(&groups(&["emergency contact", "proxy"])),
            Role::Proxy
        );
    }

    #[test]
    fn test_missing_mfa_is_a_violation() {
        let policy = AccessPolicy {
            require_mfa: true,
            ..AccessPolicy::default()
        };
        let decision = evaluate_conditional_access(&policy, &SignInContext::default());

        assert!(!decision.compliant);
        assert_eq!(decision.violations, vec![PolicyViolation::MfaRequired]);
    }

    #[test]
    fn test_every_unmet_requirement_is_listed() {
        let context = SignInContext {
            mfa_completed: false,
            device_compliant: false,
            legacy_authentication: true,
        };
        let decision = evaluate_conditional_access(&strict(), &context);

        assert_eq!(
            decision.violations,
            vec![
                PolicyViolation::MfaRequired,
                PolicyViolation::CompliantDeviceRequired,
                PolicyViolation::LegacyAuthenticationBlocked,
            ]
        );
    }

    #[test]
    fn test_all_requirements_met() {
        let context = SignInContext {
            mfa_completed: true,
            device_compliant: true,
            legacy_authentication: false,
        };
        let decision = evaluate_conditional_access(&strict(), &context);

        assert!(decision.compliant);
        assert!(decision.violations.is_empty());
    }

    #[test]
    fn test_relaxed_policy_allows_anything() {
        let context = SignInContext {
            mfa_completed: false,
            device_compliant: false,
            legacy_authentication: true,
        };

        assert!(evaluate_conditional_access(&AccessPolicy::default(), &context).compliant);
    }
}
