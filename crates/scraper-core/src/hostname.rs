use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::EndpointIdentity;
use crate::error::ScraperError;

static MLAB_HOSTNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*\.)?mlab[1-9]\.[a-z]{3}[0-9][0-9t]\.measurement-lab\.org$")
        .expect("valid regex")
});

/// Validates `hostname` against the mlab naming convention and, on success,
/// derives the `(node, site)` pair from it.
///
/// Existing archive names look like `20150706T000000Z-mlab1-acc01-ndt-0000.tgz`;
/// this mirrors the labels that produced them, e.g. for
/// `ndt.iupui.mlab2.nuq1t.measurement-lab.org` returns `("mlab2", "nuq1t")`.
pub fn node_and_site(hostname: &str) -> Result<(String, String), ScraperError> {
    if !MLAB_HOSTNAME_RE.is_match(hostname) {
        return Err(ScraperError::InvalidHostname(hostname.to_string()));
    }
    let labels: Vec<&str> = hostname.split('.').collect();
    if labels.len() < 4 {
        return Err(ScraperError::InvalidHostname(hostname.to_string()));
    }
    let node = labels[labels.len() - 4].to_string();
    let site = labels[labels.len() - 3].to_string();
    Ok((node, site))
}

/// Builds a full `EndpointIdentity` from a validated hostname and module.
pub fn endpoint_identity(
    hostname: &str,
    experiment: &str,
) -> Result<EndpointIdentity, ScraperError> {
    let (node, site) = node_and_site(hostname)?;
    Ok(EndpointIdentity {
        producer_host: hostname.to_string(),
        site,
        node,
        experiment: experiment.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_mlab_hostname() {
        let (node, site) = node_and_site("ndt.iupui.mlab2.nuq1t.measurement-lab.org").unwrap();
        assert_eq!(node, "mlab2");
        assert_eq!(site, "nuq1t");
    }

    #[test]
    fn accepts_bare_mlab_hostname() {
        let (node, site) = node_and_site("mlab1.lga0t.measurement-lab.org").unwrap();
        assert_eq!(node, "mlab1");
        assert_eq!(site, "lga0t");
    }

    #[test]
    fn rejects_non_mlab_hostname() {
        assert!(node_and_site("example.com").is_err());
        assert!(node_and_site("mlabx.lga0t.measurement-lab.org").is_err());
    }
}
