//! Address registry on top of a [`KvStore`].
//!
//! One record per (tenant, account, network) key, last write wins.
//! Every query other than a point lookup is a full scan of the store,
//! decoded key by key. Registries hold hundreds to a few thousand records.

use std::collections::{HashMap, HashSet};

use super::{decode_key, encode_key, KvStore};
use crate::error::{RegistryResult, StoreError};
use crate::models::{checksum_address, network_label, parse_address, AddressRecord, Member};

/// Registered payout addresses, scoped by tenant
#[derive(Debug)]
pub struct AddressRegistry<S> {
    store: S,
}

impl<S: KvStore> AddressRegistry<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn key(tenant: &str, account: &str, chain_id: u64) -> RegistryResult<String> {
        let chain = chain_id.to_string();
        Ok(encode_key(&[tenant, account, chain.as_str()])?)
    }

    /// Register (or replace) an address. Returns the stored EIP-55 form.
    pub async fn set_address(
        &self,
        tenant: &str,
        account: &str,
        chain_id: u64,
        address: &str,
    ) -> RegistryResult<String> {
        let address = checksum_address(&parse_address(address)?);
        let key = Self::key(tenant, account, chain_id)?;
        self.store.set(&key, &address).await?;
        Ok(address)
    }

    pub async fn get_address(
        &self,
        tenant: &str,
        account: &str,
        chain_id: u64,
    ) -> RegistryResult<Option<String>> {
        let key = Self::key(tenant, account, chain_id)?;
        Ok(self.store.get(&key).await?)
    }

    /// Returns whether an address was registered.
    pub async fn remove_address(
        &self,
        tenant: &str,
        account: &str,
        chain_id: u64,
    ) -> RegistryResult<bool> {
        let key = Self::key(tenant, account, chain_id)?;
        Ok(self.store.delete(&key).await?)
    }

    /// All records of a tenant. Keys that do not decode to a record are skipped.
    pub async fn records(&self, tenant: &str) -> RegistryResult<Vec<AddressRecord>> {
        let entries = self.store.entries().await?;
        let mut records: Vec<AddressRecord> = entries
            .into_iter()
            .filter_map(|(key, address)| match decode_key(&key).as_slice() {
                [t, account, chain] if t == tenant => Some(AddressRecord {
                    tenant_id: t.clone(),
                    account_id: account.clone(),
                    chain_id: chain.parse().ok()?,
                    address,
                }),
                _ => None,
            })
            .collect();

        records.sort_by(|a, b| {
            (a.chain_id, &a.account_id).cmp(&(b.chain_id, &b.account_id))
        });
        Ok(records)
    }

    pub async fn addresses_for_account(
        &self,
        tenant: &str,
        account: &str,
    ) -> RegistryResult<Vec<AddressRecord>> {
        let mut records = self.records(tenant).await?;
        records.retain(|r| r.account_id == account);
        Ok(records)
    }

    pub async fn accounts_on_network(
        &self,
        tenant: &str,
        chain_id: u64,
    ) -> RegistryResult<Vec<AddressRecord>> {
        let mut records = self.records(tenant).await?;
        records.retain(|r| r.chain_id == chain_id);
        Ok(records)
    }

    /// Non-bot members with no address registered on `chain_id`.
    pub async fn missing_accounts<'m>(
        &self,
        tenant: &str,
        chain_id: u64,
        members: &'m [Member],
    ) -> RegistryResult<Vec<&'m Member>> {
        let registered: HashSet<String> = self
            .accounts_on_network(tenant, chain_id)
            .await?
            .into_iter()
            .map(|r| r.account_id)
            .collect();

        Ok(members
            .iter()
            .filter(|m| !m.account.bot && !registered.contains(&m.account.id))
            .collect())
    }

    /// CSV export: `Index,Display Name,User ID,Address,Chain`.
    ///
    /// `chain_id` narrows to one network; display names come from `members`
    /// when the account is known there.
    pub async fn export_csv(
        &self,
        tenant: &str,
        chain_id: Option<u64>,
        members: &[Member],
    ) -> RegistryResult<String> {
        let mut records = self.records(tenant).await?;
        if let Some(chain_id) = chain_id {
            records.retain(|r| r.chain_id == chain_id);
        }

        let names: HashMap<&str, &str> = members
            .iter()
            .map(|m| (m.account.id.as_str(), m.display_name()))
            .collect();

        let mut writer = csv::Writer::from_writer(Vec::new());
        let csv_err = |e: csv::Error| StoreError::Io(std::io::Error::from(e));

        writer
            .write_record(["Index", "Display Name", "User ID", "Address", "Chain"])
            .map_err(csv_err)?;
        for (i, record) in records.iter().enumerate() {
            let index = (i + 1).to_string();
            let name = names.get(record.account_id.as_str()).copied().unwrap_or("");
            let chain = network_label(record.chain_id);
            writer
                .write_record([
                    index.as_str(),
                    name,
                    record.account_id.as_str(),
                    record.address.as_str(),
                    chain.as_str(),
                ])
                .map_err(csv_err)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| StoreError::Io(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
