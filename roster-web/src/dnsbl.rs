// Roster - membership and identity backend for an XMPP service provider
// Copyright (C) 2026 Roster Project Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use hickory_resolver::{
    config::{ResolverConfig, ResolverOpts},
    TokioAsyncResolver,
};
use std::{
    collections::HashMap,
    net::IpAddr,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

const CACHE_TTL: Duration = Duration::from_secs(3600);

/// Verdict for one address, possibly with the reason published in the
/// list's TXT record.
#[derive(Debug, Clone, PartialEq)]
pub enum DnsblResult {
    Clean,
    Listed { zone: String, reason: Option<String> },
}

impl DnsblResult {
    pub fn is_listed(&self) -> bool {
        matches!(self, DnsblResult::Listed { .. })
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    result: DnsblResult,
    expires_at: Instant,
}

/// Checks client addresses against DNS blocklists. A listed address resolves
/// under `<reversed-octets>.<zone>`; results are cached for an hour so a
/// registration burst does not hammer the resolver.
pub struct DnsblChecker {
    resolver: TokioAsyncResolver,
    zones: Vec<String>,
    cache: RwLock<HashMap<IpAddr, CacheEntry>>,
}

impl DnsblChecker {
    pub fn new(zones: Vec<String>) -> Self {
        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
        Self {
            resolver,
            zones,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.zones.is_empty()
    }

    pub async fn check(&self, addr: IpAddr) -> DnsblResult {
        if self.zones.is_empty() {
            return DnsblResult::Clean;
        }

        if let Some(entry) = self.cache.read().await.get(&addr) {
            if entry.expires_at > Instant::now() {
                return entry.result.clone();
            }
        }

        let result = self.query(addr).await;
        self.store(addr, result.clone(), CACHE_TTL).await;

        result
    }

    /// Cache a verdict, dropping every expired entry first so the map does
    /// not grow without bound under a stream of unique client addresses.
    async fn store(&self, addr: IpAddr, result: DnsblResult, ttl: Duration) {
        let now = Instant::now();
        let mut cache = self.cache.write().await;
        cache.retain(|_, entry| entry.expires_at > now);
        cache.insert(
            addr,
            CacheEntry {
                result,
                expires_at: now + ttl,
            },
        );
    }

    async fn query(&self, addr: IpAddr) -> DnsblResult {
        let reversed = reverse_octets(addr);

        for zone in &self.zones {
            let name = format!("{}.{}", reversed, zone);

            // NXDOMAIN means not listed; only a successful A lookup counts.
            match self.resolver.lookup_ip(name.clone()).await {
                Ok(lookup) if lookup.iter().next().is_some() => {
                    let reason = self.lookup_reason(&name).await;
                    tracing::info!(addr = %addr, zone = %zone, reason = ?reason, "Address is DNSBL-listed");
                    return DnsblResult::Listed {
                        zone: zone.clone(),
                        reason,
                    };
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(addr = %addr, zone = %zone, error = %e, "DNSBL lookup negative or failed");
                }
            }
        }

        DnsblResult::Clean
    }

    async fn lookup_reason(&self, name: &str) -> Option<String> {
        let lookup = self.resolver.txt_lookup(name).await.ok()?;
        let record = lookup.iter().next()?;
        let text = record
            .iter()
            .map(|data| String::from_utf8_lossy(data).to_string())
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// DNSBL query name fragment for an address: IPv4 octets reversed, IPv6
/// nibbles reversed.
fn reverse_octets(addr: IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            format!("{}.{}.{}.{}", o[3], o[2], o[1], o[0])
        }
        IpAddr::V6(v6) => {
            let nibbles: Vec<String> = v6
                .octets()
                .iter()
                .rev()
                .flat_map(|b| [format!("{:x}", b & 0xf), format!("{:x}", b >> 4)])
                .collect();
            nibbles.join(".")
        }
    }
}
