use std::collections::{HashMap, HashSet};

use crate::{
    Call, Credentials, Endpoint, Error, ListResourceRecordSetsResponse, Name, Ns, Record,
    RecordSetFilter, Result, Soa, Transport, check, parse_xml,
};

const API_VERSION: &str = "2013-04-01";

/// Record sets grouped by owner name.
pub type RecordSets = HashMap<Name, HashSet<Record>>;

/// Read-only client for Route53 hosted zones.
#[derive(Clone)]
pub struct Route53Client {
    transport: Transport,
    credentials: Credentials,
}

impl Route53Client {
    pub fn new(endpoint: Endpoint, credentials: Credentials) -> Self {
        Self {
            transport: Transport::new(endpoint, "route53"),
            credentials,
        }
    }

    /// List the record sets of a hosted zone, following pagination unless
    /// `filter.max_items` caps the listing to a single page.
    ///
    /// Only SOA and NS records are typed; other record types are skipped.
    pub async fn list_resource_record_sets(
        &self,
        zone_id: &str,
        filter: &RecordSetFilter,
    ) -> Result<RecordSets> {
        let mut result = RecordSets::new();
        let mut page = filter.clone();

        loop {
            let listing = self.list_page(zone_id, &page).await?;
            extract_record_sets(&listing, &mut result)?;

            if filter.max_items.is_some() {
                break;
            }
            match next_page(&page, &listing)? {
                Some(next) => page = next,
                None => break,
            }
        }

        Ok(result)
    }

    async fn list_page(
        &self,
        zone_id: &str,
        filter: &RecordSetFilter,
    ) -> Result<ListResourceRecordSetsResponse> {
        let mut params: Vec<(String, String)> = Vec::new();
        if let Some(identifier) = &filter.identifier {
            params.push(("identifier".into(), identifier.clone()));
        }
        if let Some(max_items) = filter.max_items {
            params.push(("maxitems".into(), max_items.to_string()));
        }
        if let Some(name) = &filter.name {
            params.push(("name".into(), name.clone()));
        }
        if let Some(record_type) = &filter.record_type {
            params.push(("type".into(), record_type.clone()));
        }

        let path = format!("/{API_VERSION}/hostedzone/{zone_id}/rrset");
        let (uri, resp) = self
            .transport
            .send(Call::get(&path, &params).signed(&self.credentials))
            .await?;

        let annotate = |source: Error| Error::WhileRequesting {
            uri: uri.clone(),
            source: Box::new(source),
        };

        let body = check(resp, "list resource record sets")
            .await
            .map_err(annotate)?
            .text()
            .await
            .map_err(|e| annotate(e.into()))?;
        parse_xml(&body, "list resource record sets").map_err(annotate)
    }
}

/// Filter for the page after `listing`, or `None` when it was the last one.
///
/// A truncated page must carry a `NextRecordName` that moves the listing
/// forward; anything else would request the same page again.
pub fn next_page(
    current: &RecordSetFilter,
    listing: &ListResourceRecordSetsResponse,
) -> Result<Option<RecordSetFilter>> {
    if !listing.is_truncated {
        return Ok(None);
    }
    let Some(name) = listing.next_record_name.clone() else {
        return Err(Error::Pagination {
            endpoint: "list resource record sets",
            detail: "truncated page without NextRecordName".into(),
        });
    };

    let next = RecordSetFilter {
        name: Some(name),
        record_type: listing.next_record_type.clone(),
        identifier: listing.next_record_identifier.clone(),
        max_items: current.max_items,
    };
    if next.name == current.name
        && next.record_type == current.record_type
        && next.identifier == current.identifier
    {
        return Err(Error::Pagination {
            endpoint: "list resource record sets",
            detail: format!("next marker repeats {:?}", current.name),
        });
    }
    Ok(Some(next))
}

/// Fold one page of record sets into `into`.
pub fn extract_record_sets(
    listing: &ListResourceRecordSetsResponse,
    into: &mut RecordSets,
) -> Result<()> {
    for rrset in &listing.resource_record_sets.items {
        let mut records = HashSet::new();
        for value in &rrset.resource_records.items {
            if let Some(record) = Record::parse(&rrset.record_type, &value.value)? {
                records.insert(record);
            }
        }
        if records.is_empty() {
            continue;
        }
        into.entry(Name::new(rrset.name.clone()))
            .or_default()
            .extend(records);
    }
    Ok(())
}

impl Record {
    /// Parse a record value of the given type. Unsupported types yield `None`.
    pub fn parse(record_type: &str, value: &str) -> Result<Option<Self>> {
        match record_type {
            "SOA" => Soa::parse(value).map(|soa| Some(Self::Soa(soa))),
            "NS" => Ok(Some(Self::Ns(Ns {
                nameserver: Name::new(value.trim()),
            }))),
            _ => Ok(None),
        }
    }
}

impl Soa {
    /// Parse `mname rname serial refresh retry expire minimum`.
    pub fn parse(value: &str) -> Result<Self> {
        let malformed = || Error::Record {
            record_type: "SOA".into(),
            value: value.to_string(),
        };

        let fields: Vec<&str> = value.split_whitespace().collect();
        let [mname, rname, serial, refresh, retry, expire, minimum] = fields[..] else {
            return Err(malformed());
        };
        let number = |s: &str| s.parse::<u32>().map_err(|_| malformed());

        Ok(Self {
            mname: Name::new(mname),
            rname: Name::new(rname),
            serial: number(serial)?,
            refresh: number(refresh)?,
            retry: number(retry)?,
            expire: number(expire)?,
            minimum: number(minimum)?,
        })
    }
}
