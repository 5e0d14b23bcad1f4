/// Explicit allow-list of origins the view accepts messages from.
///
/// The wildcard `"*"` must be listed on purpose to accept any sender.
#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    allowed: Vec<String>,
    allow_any: bool,
}

impl OriginPolicy {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut allow_any = false;
        let mut list = Vec::new();
        for origin in allowed {
            let origin = origin.into();
            if origin == "*" {
                allow_any = true;
            } else {
                list.push(normalize(&origin));
            }
        }
        Self {
            allowed: list,
            allow_any,
        }
    }

    pub fn allow_any() -> Self {
        Self {
            allowed: Vec::new(),
            allow_any: true,
        }
    }

    pub fn permits(&self, origin: &str) -> bool {
        self.allow_any || self.allowed.iter().any(|a| *a == normalize(origin))
    }
}

/// Origins compare case-insensitively and without a trailing slash.
fn normalize(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_policy_rejects_everything() {
        let policy = OriginPolicy::default();
        assert!(!policy.permits("https://host.example"));
    }

    #[test]
    fn listed_origin_is_permitted() {
        let policy = OriginPolicy::new(["https://Host.example/"]);
        assert!(policy.permits("https://host.example"));
        assert!(!policy.permits("https://evil.example"));
    }

    #[test]
    fn wildcard_must_be_explicit() {
        let policy = OriginPolicy::new(["https://host.example", "*"]);
        assert!(policy.permits("https://anything.example"));
        assert!(OriginPolicy::allow_any().permits("null"));
    }
}
