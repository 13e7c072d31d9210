/// Controls what a call-boundary guard enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardConfig {
    /// When false, the return value is passed through without validation.
    pub check_return: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self { check_return: true }
    }
}

/// Controls how a shielded class treats its attributes and methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShieldConfig {
    /// Names starting with this prefix (dunders excepted) are private to the class lineage.
    pub private_prefix: String,
    /// When true, method arguments and returns are checked like a guarded function.
    pub guard_methods: bool,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self { private_prefix: "_".to_string(), guard_methods: true }
    }
}

impl ShieldConfig {
    /// Whether `name` is private under this configuration.
    pub fn is_private(&self, name: &str) -> bool {
        if name.starts_with("__") && name.ends_with("__") && name.len() > 4 {
            return false;
        }
        !self.private_prefix.is_empty() && name.starts_with(&self.private_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("_secret", true)]
    #[case("__mangled", true)]
    #[case("__init__", false)]
    #[case("name", false)]
    #[case("____", true)]
    fn test_default_privacy(#[case] name: &str, #[case] private: bool) {
        assert_eq!(ShieldConfig::default().is_private(name), private);
    }

    #[test]
    fn test_custom_prefix() {
        let config = ShieldConfig { private_prefix: "p_".into(), ..Default::default() };
        assert!(config.is_private("p_key"));
        assert!(!config.is_private("_key"));
        let open = ShieldConfig { private_prefix: String::new(), ..Default::default() };
        assert!(!open.is_private("_key"));
    }
}
