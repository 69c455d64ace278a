//! In-memory [`VaultBinding`] for exercising the local binding wrapper.

use parking_lot::Mutex;
use sanctum_vault_local::{RawResult, ResultCode, VaultBinding};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

/// Vaults created by [`MemoryBinding::init`], keyed by path.
static VAULTS: LazyLock<Mutex<HashMap<PathBuf, Arc<Mutex<Store>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

fn set_last_error(message: impl Into<String>) {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message.into()));
}

fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

/// Access policy attached to a stored credential.
///
/// Either a single rule or an array of rules, each naming a principal such
/// as `agent:deploy-bot` or `*`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Policy {
    One(PolicyRule),
    Many(Vec<PolicyRule>),
}

#[derive(Debug, Deserialize)]
struct PolicyRule {
    principal: String,
}

impl Policy {
    fn permits(&self, agent: &str) -> bool {
        let rules = match self {
            Self::One(rule) => std::slice::from_ref(rule),
            Self::Many(rules) => rules.as_slice(),
        };
        rules.iter().any(|rule| {
            rule.principal == "*"
                || rule
                    .principal
                    .strip_prefix("agent:")
                    .is_some_and(|id| id == agent)
        })
    }
}

#[derive(Debug)]
struct Entry {
    secret: Vec<u8>,
    owner: String,
    policy: Option<Policy>,
}

impl Entry {
    fn permits(&self, agent: &str) -> bool {
        self.owner == agent || self.policy.as_ref().is_some_and(|p| p.permits(agent))
    }
}

/// One audit log record.
#[derive(Debug, Serialize)]
struct AuditRecord {
    seq: u64,
    agent: String,
    action: &'static str,
    credential: String,
    outcome: &'static str,
}

#[derive(Debug)]
struct Store {
    passphrase_digest: [u8; 32],
    entries: BTreeMap<String, Entry>,
    audit: Vec<AuditRecord>,
}

impl Store {
    fn record(&mut self, agent: &str, action: &'static str, credential: &str, outcome: &'static str) {
        let seq = self.audit.len() as u64 + 1;
        self.audit.push(AuditRecord {
            seq,
            agent: agent.to_string(),
            action,
            credential: credential.to_string(),
            outcome,
        });
    }
}

/// A vault handle backed by process memory.
///
/// Vaults live for the lifetime of the process; `open` on the same path
/// after `init` sees the same contents. Owners can always read what they
/// stored; other agents need a matching policy rule.
#[derive(Debug)]
pub struct MemoryBinding {
    store: Arc<Mutex<Store>>,
}

fn digest(passphrase: &[u8]) -> [u8; 32] {
    Sha256::digest(passphrase).into()
}

/// Size-then-fill output helper.
fn write_out(data: &[u8], out: Option<&mut [u8]>, out_len: &mut usize) -> RawResult {
    *out_len = data.len();
    match out {
        Some(buf) if buf.len() >= data.len() => {
            buf[..data.len()].copy_from_slice(data);
            ResultCode::Ok.as_raw()
        }
        _ if data.is_empty() => ResultCode::Ok.as_raw(),
        _ => ResultCode::BufferTooSmall.as_raw(),
    }
}

fn write_json<T: Serialize>(value: &T, out: Option<&mut [u8]>, out_len: &mut usize) -> RawResult {
    match serde_json::to_vec(value) {
        Ok(bytes) => write_out(&bytes, out, out_len),
        Err(e) => {
            set_last_error(e.to_string());
            ResultCode::JsonError.as_raw()
        }
    }
}

impl VaultBinding for MemoryBinding {
    fn init(path: &Path, passphrase: &[u8]) -> Option<Self> {
        if passphrase.is_empty() {
            set_last_error("passphrase must not be empty");
            return None;
        }

        let mut vaults = VAULTS.lock();
        if vaults.contains_key(path) {
            set_last_error(format!("vault already exists at {}", path.display()));
            return None;
        }

        let store = Arc::new(Mutex::new(Store {
            passphrase_digest: digest(passphrase),
            entries: BTreeMap::new(),
            audit: Vec::new(),
        }));
        vaults.insert(path.to_path_buf(), Arc::clone(&store));
        clear_last_error();
        Some(Self { store })
    }

    fn open(path: &Path, passphrase: &[u8]) -> Option<Self> {
        let Some(store) = VAULTS.lock().get(path).cloned() else {
            set_last_error(format!("no vault at {}", path.display()));
            return None;
        };

        if store.lock().passphrase_digest != digest(passphrase) {
            set_last_error("wrong passphrase");
            return None;
        }

        clear_last_error();
        Some(Self { store })
    }

    fn last_error_message() -> Option<String> {
        LAST_ERROR.with(|slot| slot.borrow().clone())
    }

    fn store(&self, name: &str, secret: &[u8], agent: &str, policy: Option<&str>) -> RawResult {
        let policy = match policy.map(serde_json::from_str::<Policy>).transpose() {
            Ok(policy) => policy,
            Err(e) => {
                set_last_error(format!("invalid policy: {e}"));
                return ResultCode::JsonError.as_raw();
            }
        };

        let mut store = self.store.lock();
        store.entries.insert(
            name.to_string(),
            Entry {
                secret: secret.to_vec(),
                owner: agent.to_string(),
                policy,
            },
        );
        store.record(agent, "store", name, "ok");
        ResultCode::Ok.as_raw()
    }

    fn retrieve(
        &self,
        name: &str,
        agent: &str,
        out: Option<&mut [u8]>,
        out_len: &mut usize,
    ) -> RawResult {
        let mut store = self.store.lock();
        let Some(entry) = store.entries.get(name) else {
            store.record(agent, "retrieve", name, "not_found");
            return ResultCode::NotFound.as_raw();
        };
        if !entry.permits(agent) {
            store.record(agent, "retrieve", name, "denied");
            return ResultCode::AccessDenied.as_raw();
        }

        let raw = write_out(&entry.secret, out, out_len);
        if raw == ResultCode::Ok.as_raw() {
            store.record(agent, "retrieve", name, "granted");
        }
        raw
    }

    fn check_policy(&self, name: &str, agent: &str) -> RawResult {
        let store = self.store.lock();
        match store.entries.get(name) {
            None => ResultCode::NotFound.as_raw(),
            Some(entry) if entry.permits(agent) => ResultCode::Ok.as_raw(),
            Some(_) => ResultCode::AccessDenied.as_raw(),
        }
    }

    fn audit_log(
        &self,
        agent_filter: Option<&str>,
        out: Option<&mut [u8]>,
        out_len: &mut usize,
    ) -> RawResult {
        let store = self.store.lock();
        if store.audit.is_empty() {
            *out_len = 0;
            return ResultCode::Ok.as_raw();
        }

        let records: Vec<&AuditRecord> = store
            .audit
            .iter()
            .filter(|r| agent_filter.is_none_or(|agent| r.agent == agent))
            .collect();
        write_json(&records, out, out_len)
    }

    fn delete(&self, name: &str) -> RawResult {
        let mut store = self.store.lock();
        match store.entries.remove(name) {
            Some(entry) => {
                let owner = entry.owner;
                store.record(&owner, "delete", name, "ok");
                ResultCode::Ok.as_raw()
            }
            None => ResultCode::NotFound.as_raw(),
        }
    }

    fn list(&self, out: Option<&mut [u8]>, out_len: &mut usize) -> RawResult {
        let store = self.store.lock();
        let names: Vec<&String> = store.entries.keys().collect();
        write_json(&names, out, out_len)
    }
}
