//! Pod labels read and written by the controller.

use std::collections::BTreeMap;

/// Opt-in label. Only the exact value `"true"` enables a companion Service.
pub const AUTO_SERVICE_LABEL: &str = "auto-service";

/// Progress label, written only by this controller.
pub const SERVICE_ACTIVE_LABEL: &str = "service-active";

const TRUE: &str = "true";
const FALSE: &str = "false";

/// Whether the labels opt the Pod in to a companion Service
#[must_use]
pub fn is_opted_in(labels: Option<&BTreeMap<String, String>>) -> bool {
    labels
        .and_then(|l| l.get(AUTO_SERVICE_LABEL))
        .is_some_and(|v| v == TRUE)
}

/// Progress of a Pod through the two-step activation.
///
/// Stored on the Pod as the `service-active` label: absent (or any value
/// other than `"true"`/`"false"`) is `Unset`, `"false"` is `Pending`,
/// `"true"` is `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceActivity {
    /// No intent recorded yet
    Unset,
    /// Intent recorded, Service not yet created
    Pending,
    /// Service created
    Active,
}

impl ServiceActivity {
    /// Read the state from a Pod's labels
    #[must_use]
    pub fn from_labels(labels: Option<&BTreeMap<String, String>>) -> Self {
        match labels.and_then(|l| l.get(SERVICE_ACTIVE_LABEL)).map(String::as_str) {
            Some(TRUE) => Self::Active,
            Some(FALSE) => Self::Pending,
            _ => Self::Unset,
        }
    }

    /// Label value for this state, `None` for `Unset`
    #[must_use]
    pub fn label_value(self) -> Option<&'static str> {
        match self {
            Self::Unset => None,
            Self::Pending => Some(FALSE),
            Self::Active => Some(TRUE),
        }
    }

    /// Write this state into a label map
    pub fn apply_to(self, labels: &mut BTreeMap<String, String>) {
        match self.label_value() {
            Some(value) => {
                labels.insert(SERVICE_ACTIVE_LABEL.to_string(), value.to_string());
            }
            None => {
                labels.remove(SERVICE_ACTIVE_LABEL);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_opt_in_requires_exact_true() {
        assert!(is_opted_in(Some(&labels(&[("auto-service", "true")]))));
        assert!(!is_opted_in(Some(&labels(&[("auto-service", "True")]))));
        assert!(!is_opted_in(Some(&labels(&[("auto-service", "yes")]))));
        assert!(!is_opted_in(Some(&labels(&[("app", "web")]))));
        assert!(!is_opted_in(None));
    }

    #[test]
    fn test_activity_parsing() {
        assert_eq!(ServiceActivity::from_labels(None), ServiceActivity::Unset);
        assert_eq!(
            ServiceActivity::from_labels(Some(&labels(&[("service-active", "false")]))),
            ServiceActivity::Pending
        );
        assert_eq!(
            ServiceActivity::from_labels(Some(&labels(&[("service-active", "true")]))),
            ServiceActivity::Active
        );
        // Unknown values fall back to Unset
        assert_eq!(
            ServiceActivity::from_labels(Some(&labels(&[("service-active", "maybe")]))),
            ServiceActivity::Unset
        );
    }

    #[test]
    fn test_apply_round_trips_through_labels() {
        let mut map = labels(&[("app", "web")]);
        ServiceActivity::Pending.apply_to(&mut map);
        assert_eq!(map.get("service-active").map(String::as_str), Some("false"));

        ServiceActivity::Active.apply_to(&mut map);
        assert_eq!(ServiceActivity::from_labels(Some(&map)), ServiceActivity::Active);

        ServiceActivity::Unset.apply_to(&mut map);
        assert!(!map.contains_key("service-active"));
        assert_eq!(map.get("app").map(String::as_str), Some("web"));
    }
}
