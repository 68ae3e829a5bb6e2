//! DNS zone and record endpoints.

use serde::{Deserialize, Serialize};

use crate::cloud::{ApiError, Domain, DomainRecord, DomainRecordRequest};

use super::{DoClient, PAGE_SIZE};

#[derive(Serialize)]
struct CreateDomainRequest<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
struct DomainEnvelope {
    domain: DomainDto,
}

#[derive(Deserialize)]
struct DomainDto {
    name: String,
}

#[derive(Serialize)]
struct RecordPayload<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    data: &'a str,
    ttl: u32,
}

impl<'a> From<&'a DomainRecordRequest> for RecordPayload<'a> {
    fn from(value: &'a DomainRecordRequest) -> Self {
        Self {
            record_type: &value.record_type,
            name: &value.name,
            data: &value.data,
            ttl: value.ttl,
        }
    }
}

#[derive(Deserialize)]
struct RecordListResponse {
    domain_records: Vec<RecordDto>,
}

#[derive(Deserialize)]
struct RecordEnvelope {
    domain_record: RecordDto,
}

#[derive(Deserialize)]
struct RecordDto {
    id: u64,
    #[serde(rename = "type")]
    record_type: String,
    name: String,
    data: String,
    ttl: u32,
}

impl From<RecordDto> for DomainRecord {
    fn from(value: RecordDto) -> Self {
        Self {
            id: value.id,
            record_type: value.record_type,
            name: value.name,
            data: value.data,
            ttl: value.ttl,
        }
    }
}

impl DoClient {
    /// Fetches a DNS zone by name, mapping a 404 to `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails for any reason other
    /// than the zone not existing.
    pub(in crate::digitalocean) async fn domain(
        &self,
        name: &str,
    ) -> Result<Option<Domain>, ApiError> {
        let path = format!("/domains/{name}");
        let parsed: Option<DomainEnvelope> = self.get(&path).await?.success_or_none()?;
        Ok(parsed.map(|envelope| Domain {
            name: envelope.domain.name,
        }))
    }

    /// Creates a DNS zone.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the provider rejects the request.
    pub(in crate::digitalocean) async fn add_domain(&self, name: &str) -> Result<Domain, ApiError> {
        let payload = CreateDomainRequest { name };
        let parsed: DomainEnvelope = self.post("/domains", &payload).await?.success()?;
        Ok(Domain {
            name: parsed.domain.name,
        })
    }

    /// Lists the records of zone `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the request fails.
    pub(in crate::digitalocean) async fn domain_records(
        &self,
        domain: &str,
    ) -> Result<Vec<DomainRecord>, ApiError> {
        let path = format!("/domains/{domain}/records?per_page={PAGE_SIZE}");
        let parsed: RecordListResponse = self.get(&path).await?.success()?;
        Ok(parsed
            .domain_records
            .into_iter()
            .map(DomainRecord::from)
            .collect())
    }

    /// Creates a record in zone `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the provider rejects the request.
    pub(in crate::digitalocean) async fn add_domain_record(
        &self,
        domain: &str,
        request: &DomainRecordRequest,
    ) -> Result<DomainRecord, ApiError> {
        let payload = RecordPayload::from(request);
        let path = format!("/domains/{domain}/records");
        let parsed: RecordEnvelope = self.post(&path, &payload).await?.success()?;
        Ok(parsed.domain_record.into())
    }

    /// Updates record `record_id` in zone `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the provider rejects the request.
    pub(in crate::digitalocean) async fn replace_domain_record(
        &self,
        domain: &str,
        record_id: u64,
        request: &DomainRecordRequest,
    ) -> Result<DomainRecord, ApiError> {
        let payload = RecordPayload::from(request);
        let path = format!("/domains/{domain}/records/{record_id}");
        let parsed: RecordEnvelope = self.put(&path, &payload).await?.success()?;
        Ok(parsed.domain_record.into())
    }
}
