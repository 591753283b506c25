//! Host DNS resolver configuration.
//!
//! Containers inherit the host's nameservers and search domain. Only the
//! `nameserver` and `search` keywords are read; everything after a `#` on
//! those lines is a comment.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

use berth_common::{BerthError, BerthResult};

use crate::address::NetworkAddress;

/// Nameservers and search domain found in a resolver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolverConfig {
    /// Nameserver addresses, in file order.
    pub nameservers: Vec<NetworkAddress>,
    /// Search domain from the last `search` line, or empty.
    pub search_domain: String,
}

impl ResolverConfig {
    /// Search domains as a list; empty when no `search` line was found.
    #[must_use]
    pub fn search_domains(&self) -> Vec<String> {
        if self.search_domain.is_empty() {
            Vec::new()
        } else {
            vec![self.search_domain.clone()]
        }
    }

    fn apply_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return;
        }
        if let Some(address) = keyword_value(line, "nameserver") {
            self.nameservers.push(NetworkAddress::new(address));
        } else if let Some(domain) = keyword_value(line, "search") {
            self.search_domain = domain.to_string();
        }
    }
}

/// Value following `keyword`, with any trailing comment dropped.
fn keyword_value<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let value = rest.split('#').next().unwrap_or_default().trim();
    (!value.is_empty()).then_some(value)
}

/// Parse resolver configuration text.
#[must_use]
pub fn parse_resolver_config(contents: &str) -> ResolverConfig {
    let mut config = ResolverConfig::default();
    for line in contents.lines() {
        config.apply_line(line);
    }
    config
}

/// Read the resolver configuration at `path`.
///
/// A missing file yields an empty configuration: hosts may rely purely on
/// DHCP-injected resolution.
///
/// # Errors
///
/// Returns [`BerthError::ResolvConf`] if the file exists but cannot be
/// opened or read to the end.
pub fn read_resolver_config(path: &Path) -> BerthResult<ResolverConfig> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No resolver configuration found");
            return Ok(ResolverConfig::default());
        }
        Err(source) => {
            return Err(BerthError::ResolvConf {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut config = ResolverConfig::default();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| BerthError::ResolvConf {
            path: path.to_path_buf(),
            source,
        })?;
        config.apply_line(&line);
    }

    tracing::trace!(
        path = %path.display(),
        nameservers = config.nameservers.len(),
        search = %config.search_domain,
        "Read resolver configuration"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
# Generated by NetworkManager
search example.com lab.example.com # office
nameserver 10.0.0.2
nameserver   192.168.1.1# secondary

options edns0
";

    #[test]
    fn parses_nameservers_in_order_and_strips_comments() {
        let config = parse_resolver_config(SAMPLE);
        let servers: Vec<&str> = config.nameservers.iter().map(NetworkAddress::value).collect();
        assert_eq!(servers, ["10.0.0.2", "192.168.1.1"]);
        assert_eq!(config.search_domain, "example.com lab.example.com");
    }

    #[test]
    fn last_search_line_wins() {
        let config = parse_resolver_config("search a.example\nsearch b.example\n");
        assert_eq!(config.search_domain, "b.example");
        assert_eq!(config.search_domains(), vec!["b.example".to_string()]);
    }

    #[test]
    fn ignores_lookalike_keywords_and_empty_values() {
        let config = parse_resolver_config("nameservers 1.1.1.1\nnameserver\nsearchdomain x\n");
        assert!(config.nameservers.is_empty());
        assert!(config.search_domain.is_empty());
        assert!(config.search_domains().is_empty());
    }

    #[test]
    fn reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = read_resolver_config(file.path()).unwrap();
        assert_eq!(config, parse_resolver_config(SAMPLE));
        // Reading twice yields the same result.
        assert_eq!(read_resolver_config(file.path()).unwrap(), config);
    }

    #[test]
    fn missing_file_is_empty_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = read_resolver_config(&dir.path().join("resolv.conf")).unwrap();
        assert!(config.nameservers.is_empty());
        assert!(config.search_domain.is_empty());
    }

    #[test]
    fn unreadable_content_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"nameserver 10.0.0.2\nsearch \xff\xfe\n").unwrap();

        let err = read_resolver_config(file.path()).unwrap_err();
        match err {
            BerthError::ResolvConf { path, source } => {
                assert_eq!(path, file.path());
                assert_eq!(source.kind(), ErrorKind::InvalidData);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn directory_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_resolver_config(dir.path()),
            Err(BerthError::ResolvConf { .. })
        ));
    }

    proptest::proptest! {
        #[test]
        fn parsing_is_deterministic(lines in proptest::collection::vec(
            proptest::prop_oneof![
                "nameserver [0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}( #[a-z ]{0,8})?",
                "search [a-z]{1,8}\\.[a-z]{2,3}( #[a-z]{0,5})?",
                "#[ -~]{0,20}",
                "[ \t]{0,3}",
                "options [a-z:0-9]{1,10}",
            ],
            0..12,
        )) {
            let text = lines.join("\n");
            let first = parse_resolver_config(&text);
            proptest::prop_assert_eq!(&first, &parse_resolver_config(&text));
            let expected = lines.iter().filter(|l| l.starts_with("nameserver")).count();
            proptest::prop_assert_eq!(first.nameservers.len(), expected);
        }
    }
}
