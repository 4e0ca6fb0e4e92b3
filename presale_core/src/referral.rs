// Sponsor (referral uplink) handling

use crate::chain_client::{ChainClient, RpcResult};
use crate::document_store::{paths, DocumentStore, StoreResult};
use chrono::{DateTime, Utc};
use ethers::types::Address;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of reading the sponsor field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SponsorInput {
    /// Field left empty: purchase without a sponsor.
    Empty,
    Valid(Address),
    /// Something was typed but it is not an address; treated as no sponsor.
    Rejected,
}

impl SponsorInput {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return SponsorInput::Empty;
        }
        match trimmed.parse::<Address>() {
            Ok(addr) if trimmed.starts_with("0x") || trimmed.starts_with("0X") => SponsorInput::Valid(addr),
            _ => SponsorInput::Rejected,
        }
    }

    /// Address passed to the sale contract; the zero address means "no sponsor".
    pub fn address(&self) -> Address {
        match self {
            SponsorInput::Valid(addr) => *addr,
            SponsorInput::Empty | SponsorInput::Rejected => Address::zero(),
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, SponsorInput::Rejected)
    }
}

/// Three referral levels above `account`, zero address where a level is unset.
pub async fn fetch_uplines<C: ChainClient + ?Sized>(account: Address, client: &C) -> RpcResult<[Address; 3]> {
    client.uplines(account).await
}

/// A user who registered with someone's invite link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Downline {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// File `invitee` under the inviter's referral collection. Repeating it merges.
pub async fn record_downline(store: &dyn DocumentStore, inviter_uid: &str, invitee: &Downline) -> StoreResult<()> {
    let fields = serde_json::to_value(invitee)?;
    store.merge(&paths::user_referral(inviter_uid, &invitee.uid), fields).await
}

/// Direct invitees of `uid`, one entry per invitee, ordered by uid.
pub async fn list_downlines(store: &dyn DocumentStore, uid: &str) -> StoreResult<Vec<Downline>> {
    let docs = store.list(&paths::user_referrals(uid)).await?;
    let mut by_uid = BTreeMap::new();
    for doc in docs {
        match serde_json::from_value::<Downline>(doc) {
            Ok(downline) if !downline.uid.is_empty() => {
                by_uid.insert(downline.uid.clone(), downline);
            }
            Ok(_) => debug!("Skipping referral entry without uid under {}", uid),
            Err(e) => debug!("Skipping malformed referral entry under {}: {}", uid, e),
        }
    }
    Ok(by_uid.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_store::MemoryDocumentStore;
    use serde_json::json;

    #[test]
    fn sponsor_parsing() {
        let addr = "0x02b0364a53f2D82d8EcBB4ccF058A44784f0dc3c";
        assert_eq!(SponsorInput::parse(addr).address(), addr.parse::<Address>().unwrap());
        assert_eq!(SponsorInput::parse(""), SponsorInput::Empty);
        assert_eq!(SponsorInput::parse("  "), SponsorInput::Empty);

        let bad = SponsorInput::parse("0x1234");
        assert!(bad.is_rejected());
        assert_eq!(bad.address(), Address::zero());

        // Bare hex without the 0x prefix is not accepted as an address
        assert!(SponsorInput::parse("02b0364a53f2D82d8EcBB4ccF058A44784f0dc3c").is_rejected());
    }

    fn invitee(uid: &str, email: &str) -> Downline {
        Downline {
            uid: uid.to_string(),
            email: Some(email.to_string()),
            display_name: email.split('@').next().map(str::to_string),
            created_at: None,
        }
    }

    #[tokio::test]
    async fn downlines_are_listed_per_inviter() {
        let store = MemoryDocumentStore::new();
        record_downline(&store, "inviter", &invitee("u-b", "bob@example.com")).await.unwrap();
        record_downline(&store, "inviter", &invitee("u-a", "ann@example.com")).await.unwrap();
        record_downline(&store, "other", &invitee("u-c", "cat@example.com")).await.unwrap();

        let downlines = list_downlines(&store, "inviter").await.unwrap();
        let uids: Vec<&str> = downlines.iter().map(|d| d.uid.as_str()).collect();
        assert_eq!(uids, vec!["u-a", "u-b"]);
        assert_eq!(downlines[0].display_name.as_deref(), Some("ann"));

        let doc = store.get("users/inviter/referral/u-a").await.unwrap().unwrap();
        assert_eq!(doc["displayName"], "ann");
    }

    #[tokio::test]
    async fn repeated_registration_keeps_one_entry() {
        let store = MemoryDocumentStore::new();
        record_downline(&store, "inviter", &invitee("u-a", "ann@example.com")).await.unwrap();
        record_downline(&store, "inviter", &invitee("u-a", "ann@example.org")).await.unwrap();

        let downlines = list_downlines(&store, "inviter").await.unwrap();
        assert_eq!(downlines.len(), 1);
        assert_eq!(downlines[0].email.as_deref(), Some("ann@example.org"));
    }

    #[tokio::test]
    async fn entries_without_uid_are_skipped() {
        let store = MemoryDocumentStore::new();
        store.merge("users/inviter/referral/x", json!({"email": "x@example.com"})).await.unwrap();
        store.merge("users/inviter/referral/y", json!({"uid": "", "email": null})).await.unwrap();
        record_downline(&store, "inviter", &invitee("u-a", "ann@example.com")).await.unwrap();

        let downlines = list_downlines(&store, "inviter").await.unwrap();
        assert_eq!(downlines.len(), 1);
        assert!(list_downlines(&store, "nobody").await.unwrap().is_empty());
    }
}
