use std::net::IpAddr;

use async_trait::async_trait;
use guardian_email_core::{ResolveError, TxtLookup, TxtRecord};
use log::debug;
use trust_dns_resolver::{
    config::{NameServerConfigGroup, ResolverConfig, ResolverOpts},
    TokioAsyncResolver,
};

/// TXT lookups over a real resolver.
#[derive(Clone)]
pub struct DnsTxtLookup {
    resolver: TokioAsyncResolver,
}

impl DnsTxtLookup {
    /// Uses the host's resolver configuration (`/etc/resolv.conf`).
    pub fn from_system_conf() -> anyhow::Result<Self> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()?;
        Ok(Self { resolver })
    }

    /// Queries a single name server over plain UDP/TCP port 53.
    pub fn with_nameserver(ip: IpAddr) -> Self {
        let resolver = TokioAsyncResolver::tokio(
            ResolverConfig::from_parts(
                None,
                vec![],
                NameServerConfigGroup::from_ips_clear(&[ip], 53, true),
            ),
            ResolverOpts::default(),
        );
        Self { resolver }
    }
}

#[async_trait]
impl TxtLookup for DnsTxtLookup {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<TxtRecord>, ResolveError> {
        let lookup = self
            .resolver
            .txt_lookup(name)
            .await
            .map_err(|e| ResolveError::Dns(e.to_string()))?;

        let records: Vec<TxtRecord> = lookup
            .iter()
            .map(|txt| txt.txt_data().iter().map(|chunk| chunk.to_vec()).collect())
            .collect();
        debug!("{}: {} TXT record(s)", name, records.len());
        Ok(records)
    }
}
