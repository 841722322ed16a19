//! Ledger - income and credit audit log
//!
//! Records every change to a node's monetary figures and wallet, so any
//! balance can be explained entry by entry.

use std::io::{self, Write};

use serde::Serialize;
use utoipa::ToSchema;

use crate::core_types::{Amount, NodeId, SaleId, SeqNum};

/// Figure an entry changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LedgerField {
    TotalSales,
    DirectIncome,
    IndirectIncome,
    CreditWallet,
}

impl LedgerField {
    pub fn as_str(self) -> &'static str {
        match self {
            LedgerField::TotalSales => "total_sales",
            LedgerField::DirectIncome => "direct_income",
            LedgerField::IndirectIncome => "indirect_income",
            LedgerField::CreditWallet => "credit_wallet",
        }
    }
}

/// What caused an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    Sale,
    DirectCommission,
    /// Level 1 = first paid structural ancestor
    IndirectCommission { level: usize },
    Correction,
    RewardAllocation { run: u64 },
}

impl LedgerReason {
    fn label(&self) -> String {
        match self {
            LedgerReason::Sale => "sale".into(),
            LedgerReason::DirectCommission => "direct_commission".into(),
            LedgerReason::IndirectCommission { level } => format!("indirect_commission_l{}", level),
            LedgerReason::Correction => "correction".into(),
            LedgerReason::RewardAllocation { run } => format!("reward_allocation_r{}", run),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LedgerOp {
    Credit,
    Debit,
}

impl LedgerOp {
    pub fn as_str(self) -> &'static str {
        match self {
            LedgerOp::Credit => "credit",
            LedgerOp::Debit => "debit",
        }
    }
}

/// One change to one figure of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LedgerEntry {
    pub seq: SeqNum,
    pub sale_id: Option<SaleId>,
    pub node_id: NodeId,
    pub field: LedgerField,
    pub reason: LedgerReason,
    pub op: LedgerOp,
    pub delta: Amount,
    pub value_after: Amount,
}

/// In-memory ledger, append only
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
    next_seq: SeqNum,
}

/// Fields of a pending entry; the ledger assigns `seq`.
pub struct EntryDraft {
    pub sale_id: Option<SaleId>,
    pub node_id: NodeId,
    pub field: LedgerField,
    pub reason: LedgerReason,
    pub op: LedgerOp,
    pub delta: Amount,
    pub value_after: Amount,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, draft: EntryDraft) -> SeqNum {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.entries.push(LedgerEntry {
            seq,
            sale_id: draft.sale_id,
            node_id: draft.node_id,
            field: draft.field,
            reason: draft.reason,
            op: draft.op,
            delta: draft.delta,
            value_after: draft.value_after,
        });
        seq
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn entries_for(&self, node_id: NodeId) -> Vec<LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| e.node_id == node_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Export every entry as CSV
    pub fn export_csv<W: Write>(&self, out: W) -> io::Result<u64> {
        let mut writer = LedgerWriter::new(out)?;
        for entry in &self.entries {
            writer.write_entry(entry)?;
        }
        writer.flush()?;
        Ok(writer.entry_count())
    }
}

/// Writes ledger entries as CSV
pub struct LedgerWriter<W: Write> {
    out: W,
    entry_count: u64,
}

impl<W: Write> LedgerWriter<W> {
    /// Wrap `out` and emit the header line
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(out, "seq,sale_id,node_id,field,reason,op,delta,value_after")?;
        Ok(LedgerWriter {
            out,
            entry_count: 0,
        })
    }

    pub fn write_entry(&mut self, entry: &LedgerEntry) -> io::Result<()> {
        writeln!(
            self.out,
            "{},{},{},{},{},{},{},{}",
            entry.seq,
            entry.sale_id.map(|s| s.to_string()).unwrap_or_default(),
            entry.node_id,
            entry.field.as_str(),
            entry.reason.label(),
            entry.op.as_str(),
            entry.delta,
            entry.value_after
        )?;
        self.entry_count += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Get total number of entries written
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }
}
