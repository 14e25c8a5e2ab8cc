use serde::Deserialize;

/// Tunables for [`crate::ordering::Ordering`]. Every field has a default, so
/// a partial `[ordering]` table deserializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrderingConfig {
    /// Pass edges from a definition to itself on to the dependency listener.
    pub report_self_dependencies: bool,
    /// Emit a warning when a recursive group cannot be ordered consistently.
    pub warn_on_inconsistent_order: bool,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        OrderingConfig {
            report_self_dependencies: true,
            warn_on_inconsistent_order: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_table_uses_defaults() {
        let config: OrderingConfig = toml::from_str("warn_on_inconsistent_order = true").unwrap();
        assert_eq!(
            config,
            OrderingConfig {
                report_self_dependencies: true,
                warn_on_inconsistent_order: true,
            }
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(toml::from_str::<OrderingConfig>("stages = 3").is_err());
    }
}
