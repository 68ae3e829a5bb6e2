//! DNS zone and record reconciliation.

use std::net::Ipv4Addr;

use super::{ReconcileError, Reconciler, api_error};
use crate::cloud::{CloudApi, Domain, DomainRecord, DomainRecordRequest};

const RECORD_TTL: u32 = 3600;
const MIN_DOMAIN_LABELS: usize = 2;

/// Returns the registrable zone for a configured domain: the last two
/// dot-separated labels, or the domain itself when it has no subdomain.
#[must_use]
pub fn root_domain(domain: &str) -> String {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() <= MIN_DOMAIN_LABELS {
        return domain.to_owned();
    }
    let skip = labels.len() - MIN_DOMAIN_LABELS;
    labels
        .iter()
        .skip(skip)
        .copied()
        .collect::<Vec<_>>()
        .join(".")
}

/// Returns the record name for a configured domain: `@` at the apex,
/// otherwise the sanitized leftmost label.
#[must_use]
pub fn record_name(domain: &str) -> String {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() <= MIN_DOMAIN_LABELS {
        return String::from("@");
    }
    labels
        .first()
        .map_or_else(|| String::from("@"), |label| sanitize_record_name(label))
}

/// Replaces characters outside `[A-Za-z0-9.-]` with `-`. Empty and `@`
/// inputs stand for the apex.
fn sanitize_record_name(name: &str) -> String {
    if name.is_empty() || name == "@" {
        return String::from("@");
    }
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '.' || ch == '-' {
                ch
            } else {
                '-'
            }
        })
        .collect()
}

impl<A: CloudApi> Reconciler<A> {
    /// Ensures the registrable zone for `domain` exists.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] when the lookup or creation fails.
    pub async fn ensure_domain(&self, domain: &str) -> Result<Domain, ReconcileError> {
        let root = root_domain(domain);
        let existing = self
            .api()
            .get_domain(&root)
            .await
            .map_err(|err| api_error("get domain", err))?;
        if let Some(found) = existing {
            tracing::debug!(domain = %found.name, "domain already exists");
            return Ok(found);
        }

        tracing::info!(domain = %root, "creating domain");
        self.api()
            .create_domain(&root)
            .await
            .map_err(|err| api_error("create domain", err))
    }

    /// Ensures the zone carries an A record for `domain` pointing at
    /// `address`.
    ///
    /// An existing record of the same type and name is updated in place
    /// when its target or TTL drifted, and left untouched when already
    /// converged. Records are never duplicated.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] when listing, update, or creation fails.
    pub async fn ensure_dns_record(
        &self,
        domain: &str,
        address: Ipv4Addr,
    ) -> Result<DomainRecord, ReconcileError> {
        let root = root_domain(domain);
        let name = record_name(domain);
        let desired = DomainRecordRequest {
            record_type: String::from("A"),
            name: name.clone(),
            data: address.to_string(),
            ttl: RECORD_TTL,
        };

        let records = self
            .api()
            .list_domain_records(&root)
            .await
            .map_err(|err| api_error("list domain records", err))?;
        if let Some(existing) = records
            .into_iter()
            .find(|record| record.record_type == desired.record_type && record.name == name)
        {
            if existing.data == desired.data && existing.ttl == desired.ttl {
                tracing::debug!(record = %name, "dns record already converged");
                return Ok(existing);
            }
            tracing::info!(record = %name, data = %desired.data, "updating dns record");
            return self
                .api()
                .update_domain_record(&root, existing.id, &desired)
                .await
                .map_err(|err| api_error("update domain record", err));
        }

        tracing::info!(record = %name, data = %desired.data, "creating dns record");
        self.api()
            .create_domain_record(&root, &desired)
            .await
            .map_err(|err| api_error("create domain record", err))
    }
}
