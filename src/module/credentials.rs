//! Private registry credentials.
//!
//! Reads `~/.autoload/credentials`, one `[name]` section per private
//! registry:
//!
//! ```text
//! [company]
//! index_url = "https://pypi.company.com/simple/"
//! token = "..."
//! ```

use std::fs;
use std::path::Path;

use super::registry::RegistryDescriptor;

/// Load private registry descriptors from a credentials file.
///
/// A missing or unreadable file yields no registries.
pub fn load_credentials(path: &Path) -> Vec<RegistryDescriptor> {
    match fs::read_to_string(path) {
        Ok(content) => parse_credentials(&content),
        Err(_) => Vec::new(),
    }
}

/// Parse credentials file content.
pub fn parse_credentials(content: &str) -> Vec<RegistryDescriptor> {
    let mut registries: Vec<RegistryDescriptor> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            let name = line[1..line.len() - 1].trim();
            registries.push(RegistryDescriptor::private(
                name,
                format!("Private registry: {}", name),
            ));
            continue;
        }

        // Keys before the first section have nowhere to go
        let Some(current) = registries.last_mut() else {
            continue;
        };

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim().trim_matches('"').to_string();
            match key {
                "index_url" => current.index_url = Some(value),
                "base_url" => current.base_url = Some(value),
                "token" => current.token = Some(value),
                "description" => current.description = value,
                _ => {}
            }
        }
    }

    registries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sections() {
        let content = r#"
# registries
[acme]
index_url = "https://pypi.acme.example/simple/"
token = "abc"

[acme_git]
base_url = "https://git.acme.example/"
description = "ACME GitLab"
"#;
        let registries = parse_credentials(content);
        assert_eq!(registries.len(), 2);
        assert_eq!(registries[0].name, "acme");
        assert_eq!(
            registries[0].index_url.as_deref(),
            Some("https://pypi.acme.example/simple/")
        );
        assert_eq!(registries[0].token.as_deref(), Some("abc"));
        assert_eq!(registries[1].description, "ACME GitLab");
        assert_eq!(registries[1].token, None);
    }

    #[test]
    fn test_keys_outside_section_ignored() {
        let registries = parse_credentials("token = \"orphan\"\n[x]\n");
        assert_eq!(registries.len(), 1);
        assert_eq!(registries[0].token, None);
    }

    #[test]
    fn test_missing_file() {
        assert!(load_credentials(Path::new("/nonexistent/autoload/credentials")).is_empty());
    }
}
