//! Upgrading data written by older releases
//!
//! [`upgrade_record`] rewrites one stored work order of any known shape into
//! the current one. [`upgrade_storage`] runs once at startup: it finds the
//! newest layout present in the store and, when that is a legacy layout,
//! writes its records into the current layout. Legacy keys are left alone.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use cm_core::config::StorageLayout;
use cm_core::result::CmResult;
use cm_core::types::{new_record_id, Shelf};
use cm_models::material::{MaterialOrder, SupplyStatus};
use cm_models::phase::Phase;
use cm_models::records::RecordSet;
use cm_models::work_order::WorkOrder;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::kv::KeyValueStore;
use crate::layout::{
    id_to_string, v07_record_key, MonolithBlob, ShardIndex, V05Blob, V07Index, V16Blob,
    INDEX_KEY, MONOLITH_KEY, V05_KEY, V07_INDEX_KEY, V16_KEY,
};
use crate::repository::{open_repository, WorkOrderRepository};

/// Categories every furniture item carries
const ITEM_CATEGORIES: [&str; 3] = ["rilievi", "disegni", "ordini"];

/// Which layout the records were found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceLayout {
    /// Already current; nothing written
    Current,
    /// Current records stored in the layout not configured
    OtherLayout,
    V07Sharded,
    V16Monolith,
    V05Monolith,
    /// Nothing stored; an empty current layout was written
    Empty,
}

impl SourceLayout {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Current => "current layout, nothing to upgrade",
            Self::OtherLayout => "current records in the other layout",
            Self::V07Sharded => "sharded layout of release 0.7",
            Self::V16Monolith => "single blob of release 1.6",
            Self::V05Monolith => "single blob of release 0.5",
            Self::Empty => "no data found, empty store initialized",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradeReport {
    pub source: SourceLayout,
    pub active: usize,
    pub archived: usize,
    /// Records that could not be read or converted
    pub skipped: usize,
}

impl UpgradeReport {
    fn new(source: SourceLayout) -> Self {
        Self {
            source,
            active: 0,
            archived: 0,
            skipped: 0,
        }
    }
}

// ============================================================================
// Field coercion
// ============================================================================

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

/// Dates were stored as `YYYY-MM-DD`, full ISO timestamps, or `dd/mm/yyyy`
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
        .or_else(|| NaiveDate::parse_from_str(raw, "%d/%m/%Y").ok())
}

fn date(value: Option<&Value>) -> Value {
    match value {
        Some(Value::String(s)) => parse_date(s)
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn timestamp(value: Option<&Value>) -> Value {
    let parsed = match value {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0)).map(|dt| dt.and_utc())
            }),
        Some(Value::Number(n)) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    };
    parsed
        .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
        .unwrap_or(Value::Null)
}

/// Amounts and percentages, accepting "30", "30%", "1.250,50 €"
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_end_matches('%')
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '€')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };
    normalized.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn number(value: Option<&Value>) -> Value {
    match value {
        Some(Value::Number(n)) => Value::Number(n.clone()),
        Some(Value::String(s)) => parse_number(s).map(|f| json!(f)).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn record_id(value: Option<&Value>) -> Value {
    Value::String(value.and_then(id_to_string).unwrap_or_else(new_record_id))
}

fn phase_label(value: Option<&Value>) -> Phase {
    match value {
        Some(Value::String(s)) => Phase::normalize(s),
        _ => Phase::default(),
    }
}

fn status(value: Option<&Value>) -> Value {
    let status = match value {
        Some(Value::String(s)) => SupplyStatus::normalize(s),
        _ => SupplyStatus::default(),
    };
    Value::String(status.as_str().to_string())
}

fn array(value: Option<Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

// ============================================================================
// Nested shapes
// ============================================================================

fn upgrade_attachment(value: Value) -> Option<Value> {
    let Value::Object(raw) = value else {
        return None;
    };
    let mut out = Map::new();
    out.insert("name".into(), json!(text(raw.get("name"))));
    out.insert("type".into(), json!(text(raw.get("type"))));

    let data = text(raw.get("data"));
    let size = match raw.get("size") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => data
            .split_once(',')
            .map(|(_, payload)| ((payload.len() as f64) * 3.0 / 4.0).round() as u64)
            .unwrap_or(0),
    };
    out.insert("size".into(), json!(size));

    for key in ["url", "path", "note"] {
        let value = text(raw.get(key));
        if !value.is_empty() {
            out.insert(key.into(), json!(value));
        }
    }
    if !data.is_empty() {
        out.insert("data".into(), json!(data));
    }
    Some(Value::Object(out))
}

fn upgrade_documents(value: Option<Value>, ensure: &[&str]) -> Map<String, Value> {
    let mut out = Map::new();
    if let Some(Value::Object(raw)) = value {
        for (category, list) in raw {
            let entries: Vec<Value> = array(Some(list))
                .into_iter()
                .filter_map(upgrade_attachment)
                .collect();
            out.insert(category, Value::Array(entries));
        }
    }
    for category in ensure {
        out.entry(category.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
    }
    out
}

fn upgrade_line(value: Value) -> Option<Value> {
    let Value::Object(raw) = value else {
        return None;
    };
    Some(json!({
        "id": record_id(raw.get("id")),
        "materiale": text(raw.get("materiale")),
        "specifiche": text(raw.get("specifiche")),
        "quantita": text(raw.get("quantita")),
        "stato": status(raw.get("stato")),
    }))
}

fn upgrade_order(value: Value) -> Option<Value> {
    let Value::Object(mut raw) = value else {
        return None;
    };
    let mut supplier = text(raw.get("fornitore"));
    if supplier.trim().is_empty() {
        supplier = text(raw.get("titolo"));
    }
    if supplier.trim().is_empty() {
        supplier = MaterialOrder::DEFAULT_SUPPLIER.to_string();
    }
    let lines: Vec<Value> = array(raw.remove("materiali"))
        .into_iter()
        .filter_map(upgrade_line)
        .collect();
    Some(json!({
        "id": record_id(raw.get("id")),
        "fornitore": supplier,
        "dataOrdine": date(raw.get("dataOrdine")),
        "stato": status(raw.get("stato")),
        "note": text(raw.get("note")),
        "materiali": lines,
    }))
}

/// A 0.5-era material row with its detail lines becomes one order
fn order_from_flat_material(value: Value) -> Option<Value> {
    let Value::Object(mut raw) = value else {
        return None;
    };
    let details = array(raw.remove("dettagli"));

    let mut supplier = text(raw.get("fornitore"));
    if supplier.trim().is_empty() {
        supplier = details
            .iter()
            .map(|d| text(d.get("fornitore")))
            .find(|f| !f.trim().is_empty())
            .unwrap_or_else(|| MaterialOrder::DEFAULT_SUPPLIER.to_string());
    }

    let description = text(raw.get("descrizione"));
    let mut lines: Vec<Value> = details
        .into_iter()
        .filter(Value::is_object)
        .map(|d| {
            json!({
                "id": record_id(d.get("id")),
                "materiale": text(d.get("voce")),
                "specifiche": text(d.get("variante")),
                "quantita": text(d.get("qta")),
                "stato": status(d.get("stato")),
            })
        })
        .collect();
    if lines.is_empty() && !description.trim().is_empty() {
        lines.push(json!({
            "id": new_record_id(),
            "materiale": description,
            "specifiche": "",
            "quantita": "",
            "stato": status(raw.get("stato")),
        }));
    }

    Some(json!({
        "id": record_id(raw.get("id")),
        "fornitore": supplier,
        "dataOrdine": Value::Null,
        "stato": status(raw.get("stato")),
        "note": description,
        "materiali": lines,
    }))
}

fn upgrade_item(value: Value) -> Option<Value> {
    let Value::Object(mut raw) = value else {
        return None;
    };
    let orders: Vec<Value> = array(raw.remove("ordini"))
        .into_iter()
        .filter_map(upgrade_order)
        .collect();
    Some(json!({
        "id": record_id(raw.get("id")),
        "nome": text(raw.get("nome")),
        "fase": phase_label(raw.get("fase")).clamp_for_item(),
        "note": text(raw.get("note")),
        "ordini": orders,
        "documenti": upgrade_documents(raw.remove("documenti"), &ITEM_CATEGORIES),
    }))
}

fn upgrade_invoice(value: Value) -> Option<Value> {
    let Value::Object(raw) = value else {
        return None;
    };
    let percentage = raw.get("percentuale").or_else(|| raw.get("percent"));
    let payment_date = raw
        .get("dataPagamento")
        .filter(|v| !v.is_null())
        .or_else(|| raw.get("data_pagamento"));
    Some(json!({
        "id": record_id(raw.get("id")),
        "numero": text(raw.get("numero")),
        "data": date(raw.get("data")),
        "importo": number(raw.get("importo")),
        "percentuale": number(percentage),
        "pagata": truthy(raw.get("pagata")),
        "dataPagamento": date(payment_date),
        "note": text(raw.get("note")),
    }))
}

fn party(value: Option<Value>, fields: &[&str]) -> Map<String, Value> {
    let mut out = Map::new();
    match value {
        Some(Value::Object(raw)) => {
            for field in fields {
                out.insert(field.to_string(), json!(text(raw.get(*field))));
            }
            // companies were once stored under their business name
            let company = text(raw.get("ragioneSociale"));
            let blank = text(out.get("nome")).trim().is_empty();
            if blank && !company.trim().is_empty() {
                out.insert("nome".into(), json!(company));
            }
        }
        other => {
            for field in fields {
                out.insert(field.to_string(), json!(""));
            }
            out.insert("nome".into(), json!(text(other.as_ref())));
        }
    }
    out
}

// ============================================================================
// Record upgrade
// ============================================================================

/// Rewrite one stored work order into the current shape.
///
/// Returns None when the value is not an object at all.
pub fn upgrade_record(value: Value) -> Option<Value> {
    let Value::Object(mut raw) = value else {
        return None;
    };

    let flat_client = raw.get("cliente").and_then(Value::as_str).map(str::to_string);
    let flat_item = raw.get("mobile").and_then(Value::as_str).map(str::to_string);
    let is_flat = flat_client.is_some() || flat_item.is_some() || raw.contains_key("stato");

    let phase = match raw.get("fase") {
        Some(v) if !v.is_null() => phase_label(Some(v)),
        _ => phase_label(raw.get("stato")),
    };

    let mut name = text(raw.get("nome"));
    if name.trim().is_empty() && is_flat {
        name = [flat_client.as_deref(), flat_item.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" - ");
    }

    let mut note = text(raw.get("note"));
    let missing = text(raw.get("mancanze"));
    if !missing.trim().is_empty() {
        if note.trim().is_empty() {
            note = missing;
        } else {
            note = format!("{}\n{}", note, missing);
        }
    }

    // invoices, folding the single legacy invoice in when the list is empty
    let mut invoices: Vec<Value> = array(raw.remove("fatture"))
        .into_iter()
        .filter_map(upgrade_invoice)
        .collect();
    if invoices.is_empty() && truthy(raw.get("fattura")) {
        let paid = raw.get("pagato");
        let payment_date = match raw.get("dataPagato") {
            Some(Value::String(s)) if !s.trim().is_empty() => raw.get("dataPagato"),
            _ => paid.filter(|v| v.is_string()),
        };
        let legacy = json!({
            "data": raw.get("fattura").cloned().unwrap_or(Value::Null),
            "pagata": truthy(paid),
            "dataPagamento": payment_date.cloned().unwrap_or(Value::Null),
        });
        invoices.extend(upgrade_invoice(legacy));
    }

    // furniture items; a flat job becomes a single item
    let mut items: Vec<Value> = array(raw.remove("mobili"))
        .into_iter()
        .filter_map(upgrade_item)
        .collect();
    if items.is_empty() && is_flat {
        let orders: Vec<Value> = array(raw.remove("materiali"))
            .into_iter()
            .filter_map(order_from_flat_material)
            .collect();
        let item_name = flat_item
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "Mobile".to_string());
        items.push(json!({
            "id": new_record_id(),
            "nome": item_name,
            "fase": phase.clamp_for_item(),
            "note": "",
            "ordini": orders,
            "documenti": upgrade_documents(None, &ITEM_CATEGORIES),
        }));
    }

    // documents, moving the 1.6 invoice documents into the container
    let mut documents = upgrade_documents(raw.remove("documenti"), &[]);
    if let Some(Value::Object(mut invoice_docs)) = raw.remove("fattureDocs") {
        let moved: Vec<Value> = array(invoice_docs.remove("fatture"))
            .into_iter()
            .filter_map(upgrade_attachment)
            .collect();
        if let Value::Array(list) = documents
            .entry("fatture".to_string())
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            list.extend(moved);
        }
    }

    let quote = match raw.remove("preventivo") {
        Some(Value::Object(q)) => json!({
            "numero": text(q.get("numero")),
            "data": date(q.get("data")),
            "importo": number(q.get("importo")),
        }),
        _ => json!({ "numero": "", "data": null, "importo": null }),
    };

    let updated_at = match raw.get("updatedAt") {
        Some(v) if !v.is_null() => timestamp(Some(v)),
        _ => timestamp(raw.get("lastUpdate")),
    };

    Some(json!({
        "id": record_id(raw.get("id")),
        "nome": name,
        "cliente": party(
            raw.remove("cliente"),
            &["nome", "piva", "telefono", "email", "indirizzo", "note"],
        ),
        "architetto": party(raw.remove("architetto"), &["nome", "telefono", "note"]),
        "preventivo": quote,
        "fase": phase,
        "note": note,
        "dataPosa": date(raw.get("dataPosa")),
        "fatture": invoices,
        "mobili": items,
        "documenti": documents,
        "createdAt": timestamp(raw.get("createdAt")),
        "updatedAt": updated_at,
    }))
}

/// Upgrade and deserialize; failures are logged and yield None
pub fn decode_record(value: Value) -> Option<WorkOrder> {
    let id = value.get("id").and_then(id_to_string);
    let upgraded = match upgrade_record(value) {
        Some(v) => v,
        None => {
            warn!(id = ?id, "Stored record is not an object");
            return None;
        }
    };
    match serde_json::from_value::<WorkOrder>(upgraded) {
        Ok(order) => Some(order),
        Err(e) => {
            warn!(id = ?id, error = %e, "Stored record could not be decoded");
            None
        }
    }
}

// ============================================================================
// Storage upgrade
// ============================================================================

async fn read_json<T: serde::de::DeserializeOwned>(
    kv: &dyn KeyValueStore,
    key: &str,
) -> CmResult<Option<T>> {
    let Some(raw) = kv.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_str::<T>(&raw) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            warn!(key, error = %e, "Malformed stored JSON, ignoring");
            Ok(None)
        }
    }
}

fn collect(values: Vec<Value>, shelf: Shelf, records: &mut RecordSet, report: &mut UpgradeReport) {
    for value in values {
        match decode_record(value) {
            Some(order) if !records.contains(&order.id) => {
                match shelf {
                    Shelf::Active => report.active += 1,
                    Shelf::Archived => report.archived += 1,
                }
                records.append(order, shelf);
            }
            Some(order) => {
                warn!(id = %order.id, "Duplicate record id, keeping the first");
                report.skipped += 1;
            }
            None => report.skipped += 1,
        }
    }
}

/// Detect the stored layout and bring it to the current one.
#[instrument(skip(kv), fields(backend = kv.name()))]
pub async fn upgrade_storage(
    kv: Arc<dyn KeyValueStore>,
    target: StorageLayout,
) -> CmResult<UpgradeReport> {
    let index = read_json::<ShardIndex>(kv.as_ref(), INDEX_KEY).await?;
    let monolith = read_json::<MonolithBlob>(kv.as_ref(), MONOLITH_KEY).await?;
    match (target, &index, &monolith) {
        (StorageLayout::Sharded, Some(index), _) => {
            let mut report = UpgradeReport::new(SourceLayout::Current);
            report.active = index.active_ids.len();
            report.archived = index.archived_ids.len();
            return Ok(report);
        }
        (StorageLayout::Monolithic, _, Some(blob)) => {
            let mut report = UpgradeReport::new(SourceLayout::Current);
            report.active = blob.active.len();
            report.archived = blob.archived.len();
            return Ok(report);
        }
        _ => {}
    }

    let mut records = RecordSet::new();
    let report = if index.is_some() || monolith.is_some() {
        let other = match target {
            StorageLayout::Sharded => StorageLayout::Monolithic,
            StorageLayout::Monolithic => StorageLayout::Sharded,
        };
        records = open_repository(kv.clone(), other).load_all().await?;
        let mut report = UpgradeReport::new(SourceLayout::OtherLayout);
        report.active = records.active.len();
        report.archived = records.archived.len();
        report
    } else if let Some(legacy) = read_json::<V07Index>(kv.as_ref(), V07_INDEX_KEY).await? {
        let mut report = UpgradeReport::new(SourceLayout::V07Sharded);
        for (ids, shelf) in [
            (legacy.attivi_ids, Shelf::Active),
            (legacy.archivi_ids, Shelf::Archived),
        ] {
            let mut values = Vec::new();
            for id in ids.iter().filter_map(id_to_string) {
                match read_json::<Value>(kv.as_ref(), &v07_record_key(&id)).await? {
                    Some(value) => values.push(value),
                    None => {
                        warn!(id = %id, "Indexed record missing");
                        report.skipped += 1;
                    }
                }
            }
            collect(values, shelf, &mut records, &mut report);
        }
        report
    } else if let Some(blob) = read_json::<V16Blob>(kv.as_ref(), V16_KEY).await? {
        let mut report = UpgradeReport::new(SourceLayout::V16Monolith);
        collect(blob.commesse, Shelf::Active, &mut records, &mut report);
        report
    } else if let Some(blob) = read_json::<V05Blob>(kv.as_ref(), V05_KEY)
        .await?
        .filter(V05Blob::is_recognized)
    {
        let mut report = UpgradeReport::new(SourceLayout::V05Monolith);
        let archived = blob.archivio.or(blob.archivi).unwrap_or_default();
        collect(blob.attivi.unwrap_or_default(), Shelf::Active, &mut records, &mut report);
        collect(archived, Shelf::Archived, &mut records, &mut report);
        report
    } else {
        UpgradeReport::new(SourceLayout::Empty)
    };

    let repository = open_repository(kv.clone(), target);
    repository.replace_all(&records).await?;

    info!(
        source = ?report.source,
        active = report.active,
        archived = report.archived,
        skipped = report.skipped,
        "Storage upgraded"
    );
    Ok(report)
}
