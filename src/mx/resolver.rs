use trust_dns_resolver::{
    Resolver,
    error::{ResolveError, ResolveErrorKind},
    system_conf::read_system_conf,
};

use super::{MxError, MxRecord};
use crate::context::SendContext;

/// Lookup MX records for `domain` using the system resolver, bounded by `ctx`.
///
/// The domain is normalized via IDNA before querying DNS. Records come back
/// sorted by ascending preference, exchanges lower-cased without the trailing
/// dot. A domain without MX records is an error; there is no A/AAAA fallback.
pub fn lookup_mx(domain: &str, ctx: &SendContext) -> Result<Vec<MxRecord>, MxError> {
    let ascii = normalize_domain(domain)?;
    let records = SystemResolver.lookup_mx(&ascii, ctx)?;
    if records.is_empty() {
        return Err(MxError::no_records(ascii));
    }
    Ok(records)
}

/// Candidate hosts for `domain`, in the order the resolver returned them.
pub(crate) fn resolve_hosts<R>(
    resolver: &R,
    domain: &str,
    ctx: &SendContext,
) -> Result<Vec<String>, MxError>
where
    R: LookupMx,
{
    let ascii = normalize_domain(domain)?;
    ctx.check()?;
    let records = resolver.lookup_mx(&ascii, ctx)?;
    if records.is_empty() {
        return Err(MxError::no_records(ascii));
    }
    log_debug!(domain = %ascii, hosts = ?records, "resolved MX hosts");
    Ok(records.into_iter().map(|record| record.exchange).collect())
}

pub(crate) fn normalize_domain(domain: &str) -> Result<String, MxError> {
    let trimmed = domain.trim();
    if trimmed.is_empty() {
        return Err(MxError::EmptyDomain);
    }
    idna::domain_to_ascii(trimmed).map_err(MxError::idna)
}

pub(crate) fn normalize_exchange(exchange: String) -> String {
    let trimmed = exchange.trim_end_matches('.');
    trimmed.to_ascii_lowercase()
}

/// Source of MX records. Implementations must return records already ordered
/// by preference; callers never re-sort.
pub(crate) trait LookupMx {
    fn lookup_mx(&self, domain: &str, ctx: &SendContext) -> Result<Vec<MxRecord>, MxError>;
}

/// Platform resolver configured from the system files (`/etc/resolv.conf`).
///
/// A resolver is built per lookup so the query timeout follows the remaining
/// budget of the context; nothing is cached between sends. With a cancel
/// handle attached the query runs on a helper thread that is abandoned once
/// the handle trips.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SystemResolver;

impl LookupMx for SystemResolver {
    fn lookup_mx(&self, domain: &str, ctx: &SendContext) -> Result<Vec<MxRecord>, MxError> {
        if !ctx.is_cancellable() {
            return query_mx(domain, ctx);
        }
        let name = domain.to_string();
        let worker_ctx = ctx.clone();
        ctx.wait_for("directmail-mx", move || query_mx(&name, &worker_ctx))
            .map_err(|err| match ctx.check() {
                Err(reason) => MxError::Cancelled(reason),
                Ok(()) => MxError::resolver_init(err),
            })?
    }
}

fn query_mx(domain: &str, ctx: &SendContext) -> Result<Vec<MxRecord>, MxError> {
    let budget = ctx.remaining()?;
    let (config, mut opts) = read_system_conf().map_err(MxError::resolver_init)?;
    if let Some(budget) = budget {
        let attempts = u32::try_from(opts.attempts.max(1)).unwrap_or(u32::MAX);
        opts.timeout = opts.timeout.min(budget / attempts);
    }
    let resolver = Resolver::new(config, opts).map_err(MxError::resolver_init)?;

    let lookup = match resolver.mx_lookup(domain) {
        Ok(lookup) => lookup,
        Err(err) => return Err(lookup_failure(domain, err, ctx)),
    };
    let mut records = Vec::new();
    for mx in lookup.iter() {
        let exchange = normalize_exchange(mx.exchange().to_utf8());
        records.push(MxRecord::new(mx.preference(), exchange));
    }
    // stable: equal preferences keep answer order
    records.sort_by_key(|record| record.preference);
    Ok(records)
}

fn lookup_failure(domain: &str, err: ResolveError, ctx: &SendContext) -> MxError {
    if let ResolveErrorKind::NoRecordsFound { .. } = err.kind() {
        return MxError::no_records(domain);
    }
    match ctx.check() {
        Err(reason) => MxError::Cancelled(reason),
        Ok(()) => MxError::lookup(domain, err),
    }
}
