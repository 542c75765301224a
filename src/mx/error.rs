use thiserror::Error;

use crate::context::Cancelled;

/// Resolution failures. Any of these aborts the send before a connection is
/// attempted.
#[derive(Debug, Error)]
pub enum MxError {
    #[error("recipient domain is empty")]
    EmptyDomain,
    #[error("domain IDNA conversion failed")]
    IdnaConversion {
        #[source]
        source: idna::Errors,
    },
    #[error("resolver initialization failed: {source}")]
    ResolverInit {
        #[source]
        source: std::io::Error,
    },
    #[error("MX lookup for {domain} failed: {source}")]
    Lookup {
        domain: String,
        #[source]
        source: trust_dns_resolver::error::ResolveError,
    },
    #[error("no MX records for {domain}")]
    NoRecords { domain: String },
    #[error("MX lookup interrupted: {0}")]
    Cancelled(#[from] Cancelled),
}

impl MxError {
    pub(crate) fn idna(source: idna::Errors) -> Self {
        Self::IdnaConversion { source }
    }

    pub(crate) fn resolver_init(source: std::io::Error) -> Self {
        Self::ResolverInit { source }
    }

    pub(crate) fn lookup(
        domain: impl Into<String>,
        source: trust_dns_resolver::error::ResolveError,
    ) -> Self {
        Self::Lookup {
            domain: domain.into(),
            source,
        }
    }

    pub(crate) fn no_records(domain: impl Into<String>) -> Self {
        Self::NoRecords {
            domain: domain.into(),
        }
    }
}
