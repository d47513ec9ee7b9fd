//! # Ledger State
//!
//! The shared mutable account store the Executive borrows for the duration
//! of one transaction. Single-threaded by design: the caller guarantees
//! exclusive access, and nested call frames share the same store through
//! an exclusive reference.
//!
//! Mutations are journaled. A frame takes a [`Checkpoint`] before running
//! untrusted code and rolls back to it on a fault, instead of deep-copying
//! the store.

use crate::domain::entities::{Account, BlockContext};
use crate::domain::value_objects::{Address, Bytes, U256};
use crate::errors::StateError;
use crate::precompiles::{self, NativeContract};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

// =============================================================================
// JOURNAL
// =============================================================================

/// Marker into the journal; rolling back to it undoes every mutation made
/// after it was taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint(usize);

/// One reversible mutation of the store.
#[derive(Clone, Debug)]
enum JournalEntry {
    /// Account did not exist before; undo removes it.
    Created { address: Address },
    /// Account record was replaced wholesale (creation dispatch, kill).
    Replaced {
        address: Address,
        prev: Option<Account>,
    },
    BalanceChanged { address: Address, prev: U256 },
    NonceChanged { address: Address, prev: u64 },
    StorageChanged {
        address: Address,
        key: U256,
        prev: U256,
    },
    /// Code went from absent to present; undo clears it.
    CodeSet { address: Address },
}

// =============================================================================
// LEDGER STATE
// =============================================================================

/// Mutable mapping from address to account record, plus the per-block
/// context and the registry of native (precompiled) contracts.
pub struct LedgerState {
    accounts: HashMap<Address, Account>,
    block: BlockContext,
    natives: BTreeMap<u64, Box<dyn NativeContract>>,
    journal: Vec<JournalEntry>,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self::new(BlockContext::default())
    }
}

impl fmt::Debug for LedgerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerState")
            .field("accounts", &self.accounts.len())
            .field("block", &self.block)
            .field("natives", &self.natives.keys().collect::<Vec<_>>())
            .field("journal", &self.journal.len())
            .finish()
    }
}

impl LedgerState {
    /// Creates an empty store for the given block context, with the
    /// default native-contract registry installed.
    #[must_use]
    pub fn new(block: BlockContext) -> Self {
        Self {
            accounts: HashMap::new(),
            block,
            natives: precompiles::default_registry(),
            journal: Vec::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Block context
    // -------------------------------------------------------------------------

    /// Current block context.
    #[must_use]
    pub fn block(&self) -> &BlockContext {
        &self.block
    }

    /// Mutable block context; the block processor records cumulative gas
    /// used here between transactions.
    pub fn block_mut(&mut self) -> &mut BlockContext {
        &mut self.block
    }

    // -------------------------------------------------------------------------
    // Native contracts
    // -------------------------------------------------------------------------

    /// Looks up the native contract registered at `address`, if the address
    /// lies in the reserved low range and an entry exists.
    #[must_use]
    pub fn native(&self, address: Address) -> Option<&dyn NativeContract> {
        let index = address.native_index()?;
        self.natives.get(&index).map(Box::as_ref)
    }

    /// Registers a native contract at a reserved low-valued index.
    pub fn register_native(&mut self, index: u64, contract: Box<dyn NativeContract>) {
        self.natives.insert(index, contract);
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Balance of an address; zero for unknown accounts.
    #[must_use]
    pub fn balance(&self, address: Address) -> U256 {
        self.accounts
            .get(&address)
            .map_or_else(U256::zero, |a| a.balance)
    }

    /// Recorded nonce of an address; zero for unknown accounts.
    #[must_use]
    pub fn nonce(&self, address: Address) -> u64 {
        self.accounts.get(&address).map_or(0, |a| a.nonce)
    }

    /// Returns true if the address carries contract code.
    #[must_use]
    pub fn has_code(&self, address: Address) -> bool {
        self.accounts.get(&address).is_some_and(Account::has_code)
    }

    /// Code bytes at an address, if any.
    #[must_use]
    pub fn code(&self, address: Address) -> Option<Bytes> {
        self.accounts.get(&address).and_then(|a| a.code.clone())
    }

    /// Whole account record, if present.
    #[must_use]
    pub fn account(&self, address: Address) -> Option<&Account> {
        self.accounts.get(&address)
    }

    /// Storage value at (address, key); zero if never written.
    #[must_use]
    pub fn storage_at(&self, address: Address, key: U256) -> U256 {
        self.accounts
            .get(&address)
            .and_then(|a| a.storage.get(&key).copied())
            .unwrap_or_else(U256::zero)
    }

    // -------------------------------------------------------------------------
    // Mutators (all journaled)
    // -------------------------------------------------------------------------

    /// Credits `amount` to the address, materializing the account if needed.
    pub fn add_balance(&mut self, address: Address, amount: U256) {
        self.touch(address);
        let account = self.accounts.entry(address).or_default();
        let prev = account.balance;
        account.balance = prev.saturating_add(amount);
        self.journal
            .push(JournalEntry::BalanceChanged { address, prev });
    }

    /// Debits `amount` from the address; rejected if the balance would go
    /// negative, in which case nothing changes.
    pub fn sub_balance(&mut self, address: Address, amount: U256) -> Result<(), StateError> {
        let got = self.balance(address);
        if got < amount {
            return Err(StateError::InsufficientBalance {
                address,
                required: amount,
                got,
            });
        }
        self.touch(address);
        let account = self.accounts.entry(address).or_default();
        let prev = account.balance;
        account.balance = prev - amount;
        self.journal
            .push(JournalEntry::BalanceChanged { address, prev });
        Ok(())
    }

    /// Increments the sender's nonce by one. Called exactly once per
    /// accepted transaction, after validation and before dispatch.
    pub fn note_sending(&mut self, address: Address) {
        self.touch(address);
        let account = self.accounts.entry(address).or_default();
        let prev = account.nonce;
        account.nonce = prev + 1;
        self.journal
            .push(JournalEntry::NonceChanged { address, prev });
    }

    /// Installs code at an address. Code is immutable once set: returns
    /// false (and changes nothing) if code is already present.
    pub fn set_code(&mut self, address: Address, code: Bytes) -> bool {
        self.touch(address);
        let account = self.accounts.entry(address).or_default();
        if account.code.is_some() {
            return false;
        }
        account.code = Some(code);
        self.journal.push(JournalEntry::CodeSet { address });
        true
    }

    /// Writes a storage slot.
    pub fn set_storage(&mut self, address: Address, key: U256, value: U256) {
        self.touch(address);
        let account = self.accounts.entry(address).or_default();
        let prev = account.storage.get(&key).copied().unwrap_or_else(U256::zero);
        account.storage.insert(key, value);
        self.journal
            .push(JournalEntry::StorageChanged { address, key, prev });
    }

    /// Materializes a fresh account with the given balance, replacing any
    /// record already at the address (creation dispatch).
    pub fn create_account(&mut self, address: Address, balance: U256) {
        let prev = self.accounts.insert(address, Account::with_balance(balance));
        self.journal.push(JournalEntry::Replaced { address, prev });
    }

    /// Removes an account entirely: balance, code, and storage all cleared.
    pub fn kill_account(&mut self, address: Address) {
        let prev = self.accounts.remove(&address);
        self.journal.push(JournalEntry::Replaced { address, prev });
    }

    /// Records the account's existence before its first mutation so a
    /// rollback can remove implicitly created records.
    fn touch(&mut self, address: Address) {
        if !self.accounts.contains_key(&address) {
            self.accounts.insert(address, Account::default());
            self.journal.push(JournalEntry::Created { address });
        }
    }

    // -------------------------------------------------------------------------
    // Checkpoint / rollback
    // -------------------------------------------------------------------------

    /// Takes a checkpoint of the current journal position.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.journal.len())
    }

    /// Number of undo entries currently held.
    #[must_use]
    pub fn journal_len(&self) -> usize {
        self.journal.len()
    }

    /// Commits every journaled mutation by discarding the undo log.
    ///
    /// Called at transaction settlement, when no checkpoint can remain
    /// live; a store reused across transactions would otherwise
    /// accumulate undo entries without bound.
    pub fn commit(&mut self) {
        self.journal.clear();
    }

    /// Undoes every mutation made after `checkpoint`, in reverse order.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        while self.journal.len() > checkpoint.0 {
            let Some(entry) = self.journal.pop() else {
                break;
            };
            match entry {
                JournalEntry::Created { address } => {
                    self.accounts.remove(&address);
                }
                JournalEntry::Replaced { address, prev } => match prev {
                    Some(account) => {
                        self.accounts.insert(address, account);
                    }
                    None => {
                        self.accounts.remove(&address);
                    }
                },
                JournalEntry::BalanceChanged { address, prev } => {
                    if let Some(account) = self.accounts.get_mut(&address) {
                        account.balance = prev;
                    }
                }
                JournalEntry::NonceChanged { address, prev } => {
                    if let Some(account) = self.accounts.get_mut(&address) {
                        account.nonce = prev;
                    }
                }
                JournalEntry::StorageChanged { address, key, prev } => {
                    if let Some(account) = self.accounts.get_mut(&address) {
                        if prev.is_zero() {
                            account.storage.remove(&key);
                        } else {
                            account.storage.insert(key, prev);
                        }
                    }
                }
                JournalEntry::CodeSet { address } => {
                    if let Some(account) = self.accounts.get_mut(&address) {
                        account.code = None;
                    }
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
