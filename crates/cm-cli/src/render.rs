//! Terminal rendering
//!
//! Every function here is pure: it turns records into a [`Table`] or a
//! string and leaves printing to the caller.

use chrono::NaiveDate;
use cm_attachments::AttachmentSummary;
use cm_core::types::Shelf;
use cm_models::furniture::FurnitureItem;
use cm_models::invoice::Invoice;
use cm_models::progress::{item_progress, paid_progress, StageState};
use cm_models::work_order::WorkOrder;
use cm_services::{BoardCard, WorkOrderRow};
use cm_store::UpgradeReport;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

pub const EMPTY_LIST: &str = "Nessuna commessa trovata.";

const SHORT_ID_LEN: usize = 8;

/// Leading characters of an id, enough to select it again
pub fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

pub fn date(value: Option<NaiveDate>) -> String {
    value
        .map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Euro amount with Italian separators, e.g. `€ 1.250,50`
pub fn money(value: Option<f64>) -> String {
    let Some(value) = value else {
        return "-".to_string();
    };
    let cents = (value.abs() * 100.0).round() as u64;
    let units = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, digit) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("€ {}{},{:02}", sign, grouped, cents % 100)
}

pub fn percent(value: u8) -> String {
    format!("{}%", value)
}

fn optional_percent(value: Option<f64>) -> String {
    value
        .map(|v| format!("{}%", v))
        .unwrap_or_else(|| "-".to_string())
}

fn text(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            header
                .into_iter()
                .map(|title| Cell::new(title).add_attribute(Attribute::Bold)),
        );
    table
}

fn percent_cell(value: u8) -> Cell {
    let cell = Cell::new(percent(value));
    if value >= 100 {
        cell.fg(Color::Green)
    } else {
        cell
    }
}

/// Work order list, or the empty-list message
pub fn work_order_list(rows: &[WorkOrderRow]) -> String {
    if rows.is_empty() {
        return EMPTY_LIST.to_string();
    }
    let mut table = new_table(vec![
        "ID",
        "Commessa",
        "Cliente",
        "Preventivo",
        "Fase",
        "Mobili",
        "Produzione",
        "Fatture",
    ]);
    for row in rows {
        table.add_row(vec![
            Cell::new(short_id(&row.id)),
            Cell::new(&row.name),
            Cell::new(text(&row.client)),
            Cell::new(text(&row.quote_number)),
            Cell::new(row.phase.label()),
            Cell::new(row.items),
            percent_cell(row.production),
            percent_cell(row.paid),
        ]);
    }
    table.to_string()
}

/// General information tab
pub fn info_view(order: &WorkOrder, shelf: Shelf, production: u8) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    let rows: Vec<(&str, String)> = vec![
        ("ID", order.id.clone()),
        ("Commessa", order.display_name().to_string()),
        ("Archivio", (if shelf.is_archived() { "si" } else { "no" }).to_string()),
        ("Fase", order.phase.label().to_string()),
        ("Produzione", percent(production)),
        ("Pagato", percent(paid_progress(&order.invoices))),
        ("Data posa", date(order.installation_date)),
        ("Cliente", text(&order.client.name).to_string()),
        ("P. IVA / C.F.", text(&order.client.tax_id).to_string()),
        ("Telefono", text(&order.client.phone).to_string()),
        ("Email", text(&order.client.email).to_string()),
        ("Indirizzo", text(&order.client.address).to_string()),
        ("Note cliente", text(&order.client.note).to_string()),
        ("Architetto", text(&order.architect.name).to_string()),
        ("Tel. architetto", text(&order.architect.phone).to_string()),
        ("Note architetto", text(&order.architect.note).to_string()),
        ("Preventivo n.", text(&order.quote.number).to_string()),
        ("Data preventivo", date(order.quote.date)),
        ("Importo preventivo", money(order.quote.amount)),
        ("Note", text(&order.note).to_string()),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label).add_attribute(Attribute::Bold), Cell::new(value)]);
    }
    table.to_string()
}

/// Invoices tab with the paid share underneath
pub fn invoices_view(invoices: &[Invoice]) -> String {
    if invoices.is_empty() {
        return "Nessuna fattura.".to_string();
    }
    let mut table = new_table(vec![
        "ID", "Numero", "Data", "Importo", "%", "Pagata", "Data pagamento", "Note",
    ]);
    for invoice in invoices {
        let paid = if invoice.paid {
            Cell::new("si").fg(Color::Green)
        } else {
            Cell::new("no").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(short_id(&invoice.id)),
            Cell::new(text(&invoice.number)),
            Cell::new(date(invoice.date)),
            Cell::new(money(invoice.amount)),
            Cell::new(optional_percent(invoice.percentage)),
            paid,
            Cell::new(date(invoice.payment_date)),
            Cell::new(text(&invoice.note)),
        ]);
    }
    format!(
        "{}\nPagato: {}",
        table,
        percent(paid_progress(invoices))
    )
}

fn item_name(item: &FurnitureItem) -> &str {
    if item.name.trim().is_empty() {
        "Mobile senza titolo"
    } else {
        &item.name
    }
}

/// Furniture tab: each item with its material orders
pub fn items_view(items: &[FurnitureItem]) -> String {
    if items.is_empty() {
        return "Nessun mobile.".to_string();
    }
    let mut out = Vec::new();
    for item in items {
        out.push(format!(
            "{} [{}] {} - {}",
            item_name(item),
            short_id(&item.id),
            item.phase.label(),
            percent(item_progress(item.phase))
        ));
        if !item.note.trim().is_empty() {
            out.push(format!("  {}", item.note));
        }
        if item.orders.is_empty() {
            continue;
        }
        let mut table = new_table(vec![
            "Ordine", "Fornitore", "Data", "Stato", "Materiale", "Specifiche", "Quantita", "Stato riga",
        ]);
        for order in &item.orders {
            table.add_row(vec![
                Cell::new(short_id(&order.id)),
                Cell::new(&order.supplier),
                Cell::new(date(order.order_date)),
                Cell::new(order.status.label()),
                Cell::new(""),
                Cell::new(""),
                Cell::new(""),
                Cell::new(""),
            ]);
            for line in &order.lines {
                table.add_row(vec![
                    Cell::new(""),
                    Cell::new(""),
                    Cell::new(""),
                    Cell::new(""),
                    Cell::new(format!("{} [{}]", text(&line.material), short_id(&line.id))),
                    Cell::new(text(&line.spec)),
                    Cell::new(text(&line.quantity)),
                    Cell::new(line.status.label()),
                ]);
            }
        }
        out.push(table.to_string());
    }
    out.join("\n")
}

fn stage_symbol(state: StageState) -> char {
    match state {
        StageState::Done => '●',
        StageState::Current => '◉',
        StageState::Pending => '○',
    }
}

/// Progress board: one block per work order, one strip per item
pub fn board_view(cards: &[BoardCard]) -> String {
    if cards.is_empty() {
        return EMPTY_LIST.to_string();
    }
    let mut out = Vec::new();
    for card in cards {
        out.push(format!(
            "{} [{}]  Produzione {}  Fatture {}",
            card.order.name,
            short_id(&card.order.id),
            percent(card.order.production),
            percent(card.order.paid)
        ));
        if card.items.is_empty() {
            out.push("  Nessun mobile.".to_string());
        }
        for item in &card.items {
            let strip: String = item.stages.iter().map(|(_, state)| stage_symbol(*state)).collect();
            out.push(format!(
                "  {} {:>4}  {}  ({}, ordini {}/{})",
                strip,
                percent(item.progress),
                item.name,
                item.phase.label(),
                item.delivered_orders,
                item.orders
            ));
        }
    }
    out.join("\n")
}

/// Documents of one or more categories, numbered from 1
pub fn documents_view(groups: &[(String, Vec<AttachmentSummary>)]) -> String {
    let mut out = Vec::new();
    for (label, documents) in groups {
        out.push(format!("{} ({})", label, documents.len()));
        if documents.is_empty() {
            continue;
        }
        let mut table = new_table(vec!["#", "Tipo", "Nome", "Dimensione", "Note"]);
        for (position, summary) in documents.iter().enumerate() {
            table.add_row(vec![
                Cell::new(position + 1),
                Cell::new(&summary.badge),
                Cell::new(&summary.short_name),
                Cell::new(&summary.human_size),
                Cell::new(summary.note.as_deref().unwrap_or("")),
            ]);
        }
        out.push(table.to_string());
    }
    out.join("\n")
}

pub fn upgrade_report(report: &UpgradeReport) -> String {
    format!(
        "Archivio: {}\nAttive: {}  Archiviate: {}  Scartate: {}",
        report.source.describe(),
        report.active,
        report.archived,
        report.skipped
    )
}
