//! Command handlers
//!
//! Ids may be given as any unique prefix of the full id, so the short ids
//! printed by `list` and `show` can be typed back.

use std::path::Path;
use std::process::Command as Process;

use anyhow::Context;
use cm_core::error::{CmError, ValidationErrors};
use cm_core::result::CmResult;
use cm_core::types::{RecordId, Shelf};
use cm_models::phase::Phase;
use cm_models::progress::production_progress;
use cm_models::work_order::WorkOrder;
use cm_services::{
    board, list_rows, Commesse, DocumentTarget, Exported, InvoiceParams, ItemParams, LineParams,
    OrderParams, OrderRef, WorkOrderFilter, WorkOrderParams,
};
use cm_store::UpgradeReport;
use tracing::{debug, warn};

use crate::cli::{
    Command, DocCommand, DocTarget, FilterArgs, InvoiceArgs, InvoiceCommand, ItemArgs,
    ItemCommand, LineArgs, MaterialCommand, OrderArgs, OrderCommand, Tab, WorkOrderArgs,
};
use crate::render;

/// Pick the single id starting with `prefix`; an exact match always wins
pub fn resolve<'a>(
    entity: &'static str,
    prefix: &str,
    ids: impl IntoIterator<Item = &'a str>,
) -> CmResult<RecordId> {
    let prefix = prefix.trim();
    let mut matches = Vec::new();
    for id in ids {
        if id == prefix {
            return Ok(id.to_string());
        }
        if !prefix.is_empty() && id.starts_with(prefix) {
            matches.push(id);
        }
    }
    match matches.as_slice() {
        [id] => Ok(id.to_string()),
        [] => Err(CmError::not_found(entity, prefix)),
        _ => {
            let mut errors = ValidationErrors::new();
            errors.add(
                "id",
                format!("{} matches {} {} records", prefix, matches.len(), entity),
            );
            Err(errors.into())
        }
    }
}

fn filter_from(args: &FilterArgs) -> WorkOrderFilter {
    WorkOrderFilter::new()
        .with_text(args.search.as_deref().unwrap_or_default())
        .with_phase(args.phase)
}

fn work_order_params(name: Option<String>, args: WorkOrderArgs) -> WorkOrderParams {
    WorkOrderParams {
        name,
        phase: args.phase,
        note: args.note,
        installation_date: args.installation_date,
        client_name: args.client,
        client_tax_id: args.tax_id,
        client_phone: args.phone,
        client_email: args.email,
        client_address: args.address,
        client_note: args.client_note,
        architect_name: args.architect,
        architect_phone: args.architect_phone,
        architect_note: args.architect_note,
        quote_number: args.quote_number,
        quote_date: args.quote_date,
        quote_amount: args.quote_amount,
    }
}

fn invoice_params(args: InvoiceArgs) -> InvoiceParams {
    InvoiceParams {
        number: args.number,
        date: args.date,
        amount: args.amount,
        percentage: args.percentage,
        paid: None,
        payment_date: args.payment_date,
        note: args.note,
    }
}

fn item_params(args: ItemArgs) -> ItemParams {
    ItemParams {
        name: args.name,
        phase: args.phase,
        note: args.note,
    }
}

fn order_params(args: OrderArgs) -> OrderParams {
    OrderParams {
        supplier: args.supplier,
        order_date: args.order_date,
        status: args.status,
        note: args.note,
    }
}

fn line_params(args: LineArgs) -> LineParams {
    LineParams {
        material: args.material,
        spec: args.spec,
        quantity: args.quantity,
        status: args.status,
    }
}

/// Full ids of a material order
struct OrderPath {
    work_order: RecordId,
    item: RecordId,
    order: RecordId,
}

impl OrderPath {
    fn at(&self) -> OrderRef<'_> {
        OrderRef {
            work_order: &self.work_order,
            item: &self.item,
            order: &self.order,
        }
    }
}

/// Hand a file to the platform viewer
fn open_with_system(path: &Path) -> anyhow::Result<()> {
    #[cfg(target_os = "macos")]
    let mut process = Process::new("open");
    #[cfg(target_os = "windows")]
    let mut process = {
        let mut process = Process::new("cmd");
        process.args(["/C", "start", ""]);
        process
    };
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut process = Process::new("xdg-open");

    process
        .arg(path)
        .spawn()
        .with_context(|| format!("cannot open {}", path.display()))?;
    Ok(())
}

pub struct Runner<'a> {
    app: &'a Commesse,
    report: UpgradeReport,
}

impl<'a> Runner<'a> {
    pub fn new(app: &'a Commesse, report: UpgradeReport) -> Self {
        Self { app, report }
    }

    async fn work_order(&self, prefix: &str) -> CmResult<(WorkOrder, Shelf)> {
        let records = self.app.store.snapshot().await;
        let ids = records
            .active
            .iter()
            .chain(records.archived.iter())
            .map(|order| order.id.as_str());
        let id = resolve("WorkOrder", prefix, ids)?;
        self.app.store.get(&id).await
    }

    async fn item(&self, prefix: &str, item: &str) -> CmResult<(WorkOrder, RecordId)> {
        let (order, _) = self.work_order(prefix).await?;
        let item_id = resolve(
            "FurnitureItem",
            item,
            order.items.iter().map(|item| item.id.as_str()),
        )?;
        Ok((order, item_id))
    }

    async fn invoice_id(&self, prefix: &str, invoice: &str) -> CmResult<(WorkOrder, RecordId)> {
        let (order, _) = self.work_order(prefix).await?;
        let invoice_id = resolve(
            "Invoice",
            invoice,
            order.invoices.iter().map(|invoice| invoice.id.as_str()),
        )?;
        Ok((order, invoice_id))
    }

    async fn order_path(&self, prefix: &str, item: &str, order: &str) -> CmResult<OrderPath> {
        let (work_order, item_id) = self.item(prefix, item).await?;
        let orders = work_order
            .item(&item_id)
            .map(|item| item.orders.as_slice())
            .unwrap_or_default();
        let order_id = resolve(
            "MaterialOrder",
            order,
            orders.iter().map(|order| order.id.as_str()),
        )?;
        Ok(OrderPath {
            work_order: work_order.id.clone(),
            item: item_id,
            order: order_id,
        })
    }

    async fn line_id(&self, path: &OrderPath, line: &str) -> CmResult<RecordId> {
        let (work_order, _) = self.app.store.get(&path.work_order).await?;
        let lines = work_order
            .item(&path.item)
            .and_then(|item| item.order(&path.order))
            .map(|order| order.lines.as_slice())
            .unwrap_or_default();
        resolve("MaterialLine", line, lines.iter().map(|line| line.id.as_str()))
    }

    async fn doc_target(&self, target: &DocTarget) -> CmResult<(RecordId, DocumentTarget)> {
        match &target.item {
            None => {
                let (order, _) = self.work_order(&target.id).await?;
                Ok((order.id, DocumentTarget::WorkOrder))
            }
            Some(item) => {
                let (order, item_id) = self.item(&target.id, item).await?;
                Ok((order.id, DocumentTarget::Item(item_id)))
            }
        }
    }

    pub async fn run(&self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::List { filter, archived } => {
                let shelf = if archived {
                    Shelf::Archived
                } else {
                    Shelf::Active
                };
                let orders = self.app.store.list(shelf).await;
                let rows = list_rows(&orders, &filter_from(&filter), self.app.weights);
                println!("{}", render::work_order_list(&rows));
            }
            Command::Show { id, tab } => {
                let (order, shelf) = self.work_order(&id).await?;
                let text = match tab {
                    Tab::Info => render::info_view(
                        &order,
                        shelf,
                        production_progress(&order, self.app.weights),
                    ),
                    Tab::Invoices => render::invoices_view(&order.invoices),
                    Tab::Items => render::items_view(&order.items),
                };
                println!("{}", text);
            }
            Command::Board { filter } => {
                let orders = self.app.store.list(Shelf::Active).await;
                let cards = board(&orders, &filter_from(&filter), self.app.weights);
                println!("{}", render::board_view(&cards));
            }
            Command::New { name, fields } => {
                let order = self
                    .app
                    .work_orders
                    .create(work_order_params(Some(name), fields))
                    .await?;
                println!(
                    "Commessa creata: {} [{}]",
                    order.display_name(),
                    render::short_id(&order.id)
                );
            }
            Command::Set { id, name, fields } => {
                let (order, _) = self.work_order(&id).await?;
                let order = self
                    .app
                    .work_orders
                    .update(&order.id, work_order_params(name, fields))
                    .await?;
                println!("Commessa aggiornata: {}", order.display_name());
            }
            Command::Archive { id } => {
                let (order, _) = self.work_order(&id).await?;
                let order = self.app.work_orders.archive(&order.id).await?;
                println!("Commessa archiviata: {}", order.display_name());
            }
            Command::Restore { id } => {
                let (order, _) = self.work_order(&id).await?;
                let order = self.app.work_orders.restore(&order.id).await?;
                println!("Commessa ripristinata: {}", order.display_name());
            }
            Command::Delete { id, yes } => {
                let (order, _) = self.work_order(&id).await?;
                if !yes {
                    anyhow::bail!(
                        "refusing to delete \"{}\" permanently without --yes",
                        order.display_name()
                    );
                }
                let order = self.app.work_orders.delete(&order.id).await?;
                println!("Commessa eliminata: {}", order.display_name());
            }
            Command::Invoice(command) => self.invoice(command).await?,
            Command::Item(command) => self.furniture(command).await?,
            Command::Order(command) => self.material_order(command).await?,
            Command::Material(command) => self.material_line(command).await?,
            Command::Doc(command) => self.document(command).await?,
            Command::Migrate => println!("{}", render::upgrade_report(&self.report)),
        }
        Ok(())
    }

    async fn invoice(&self, command: InvoiceCommand) -> anyhow::Result<()> {
        let invoices = &self.app.invoices;
        let order_id = match command {
            InvoiceCommand::Add { id, fields } => {
                let (order, _) = self.work_order(&id).await?;
                let invoice = invoices.add(&order.id, invoice_params(fields)).await?;
                println!("Fattura aggiunta [{}]", render::short_id(&invoice.id));
                order.id
            }
            InvoiceCommand::Update {
                id,
                invoice,
                fields,
            } => {
                let (order, invoice_id) = self.invoice_id(&id, &invoice).await?;
                invoices
                    .update(&order.id, &invoice_id, invoice_params(fields))
                    .await?;
                println!("Fattura aggiornata");
                order.id
            }
            InvoiceCommand::Pay { id, invoice } => {
                let (order, invoice_id) = self.invoice_id(&id, &invoice).await?;
                let invoice = invoices.set_paid(&order.id, &invoice_id, true).await?;
                println!(
                    "Fattura pagata il {}",
                    render::date(invoice.payment_date)
                );
                order.id
            }
            InvoiceCommand::Unpay { id, invoice } => {
                let (order, invoice_id) = self.invoice_id(&id, &invoice).await?;
                invoices.set_paid(&order.id, &invoice_id, false).await?;
                println!("Fattura segnata come non pagata");
                order.id
            }
            InvoiceCommand::Remove { id, invoice } => {
                let (order, invoice_id) = self.invoice_id(&id, &invoice).await?;
                invoices.remove(&order.id, &invoice_id).await?;
                println!("Fattura eliminata");
                order.id
            }
        };

        let (order, _) = self.app.store.get(&order_id).await?;
        if order.phase == Phase::Paid {
            println!("Commessa {}: {}", order.display_name(), Phase::Paid.label());
        }
        Ok(())
    }

    async fn furniture(&self, command: ItemCommand) -> anyhow::Result<()> {
        let furniture = &self.app.furniture;
        match command {
            ItemCommand::Add { id, fields } => {
                let (order, _) = self.work_order(&id).await?;
                let item = furniture.add(&order.id, item_params(fields)).await?;
                println!("Mobile aggiunto [{}]", render::short_id(&item.id));
            }
            ItemCommand::Update { id, item, fields } => {
                let (order, item_id) = self.item(&id, &item).await?;
                let item = furniture
                    .update(&order.id, &item_id, item_params(fields))
                    .await?;
                println!("Mobile aggiornato: {}", item.phase.label());
            }
            ItemCommand::Remove { id, item } => {
                let (order, item_id) = self.item(&id, &item).await?;
                let item = furniture.remove(&order.id, &item_id).await?;
                println!(
                    "Mobile eliminato con {} ordini e {} documenti",
                    item.orders.len(),
                    item.documents.count()
                );
            }
        }
        Ok(())
    }

    async fn material_order(&self, command: OrderCommand) -> anyhow::Result<()> {
        let orders = &self.app.orders;
        match command {
            OrderCommand::Add { id, item, fields } => {
                let (work_order, item_id) = self.item(&id, &item).await?;
                let order = orders
                    .add(&work_order.id, &item_id, order_params(fields))
                    .await?;
                println!(
                    "Ordine aggiunto: {} [{}]",
                    order.supplier,
                    render::short_id(&order.id)
                );
            }
            OrderCommand::Update {
                id,
                item,
                order,
                fields,
            } => {
                let path = self.order_path(&id, &item, &order).await?;
                let order = orders.update(path.at(), order_params(fields)).await?;
                println!("Ordine aggiornato: {}", order.status.label());
            }
            OrderCommand::Remove { id, item, order } => {
                let path = self.order_path(&id, &item, &order).await?;
                orders.remove(path.at()).await?;
                println!("Ordine eliminato");
            }
        }
        Ok(())
    }

    async fn material_line(&self, command: MaterialCommand) -> anyhow::Result<()> {
        let orders = &self.app.orders;
        match command {
            MaterialCommand::Add {
                id,
                item,
                order,
                fields,
            } => {
                let path = self.order_path(&id, &item, &order).await?;
                let line = orders.add_line(path.at(), line_params(fields)).await?;
                println!("Materiale aggiunto [{}]", render::short_id(&line.id));
            }
            MaterialCommand::Update {
                id,
                item,
                order,
                line,
                fields,
            } => {
                let path = self.order_path(&id, &item, &order).await?;
                let line_id = self.line_id(&path, &line).await?;
                orders
                    .update_line(path.at(), &line_id, line_params(fields))
                    .await?;
                println!("Materiale aggiornato");
            }
            MaterialCommand::Remove {
                id,
                item,
                order,
                line,
            } => {
                let path = self.order_path(&id, &item, &order).await?;
                let line_id = self.line_id(&path, &line).await?;
                orders.remove_line(path.at(), &line_id).await?;
                println!("Materiale eliminato");
            }
        }
        Ok(())
    }

    async fn document(&self, command: DocCommand) -> anyhow::Result<()> {
        let documents = &self.app.documents;
        match command {
            DocCommand::Add {
                target,
                category,
                files,
            } => {
                let (id, target) = self.doc_target(&target).await?;
                let outcome = documents.add_paths(&id, &target, &category, &files).await?;
                println!("Documenti aggiunti: {}", outcome.added);
                for name in &outcome.placeholders {
                    warn!(file = %name, "Stored without content");
                    println!("Solo nota: {}", name);
                }
                if let Some(notice) = outcome.rejection_notice() {
                    eprintln!("{}", notice);
                }
            }
            DocCommand::List { target, category } => {
                let (id, target) = self.doc_target(&target).await?;
                let service = documents.vocabulary().service(&target);
                let keys: Vec<String> = match category {
                    Some(category) => vec![category],
                    None => service.category_keys().map(str::to_string).collect(),
                };
                let mut groups = Vec::with_capacity(keys.len());
                for key in keys {
                    let list = documents.list(&id, &target, &key).await?;
                    let label = service.label_of(&key).unwrap_or(&key).to_string();
                    groups.push((label, list));
                }
                println!("{}", render::documents_view(&groups));
            }
            DocCommand::Remove {
                target,
                category,
                position,
            } => {
                let (id, target) = self.doc_target(&target).await?;
                let removed = documents
                    .remove(&id, &target, &category, index_of(position))
                    .await?;
                println!("Documento eliminato: {}", removed.name);
            }
            DocCommand::Rename {
                target,
                category,
                position,
                name,
            } => {
                let (id, target) = self.doc_target(&target).await?;
                let name = documents
                    .rename(&id, &target, &category, index_of(position), &name)
                    .await?;
                println!("Documento rinominato: {}", name);
            }
            DocCommand::Open {
                target,
                category,
                position,
            } => {
                let (id, target) = self.doc_target(&target).await?;
                match documents
                    .open(&id, &target, &category, index_of(position))
                    .await?
                {
                    Exported::File(path) => {
                        debug!(path = %path.display(), "Opening document");
                        open_with_system(&path)?;
                    }
                    Exported::Url(url) => println!("{}", url),
                }
            }
            DocCommand::Download {
                target,
                category,
                position,
                dir,
            } => {
                let (id, target) = self.doc_target(&target).await?;
                match documents
                    .download(&id, &target, &category, index_of(position), &dir)
                    .await?
                {
                    Exported::File(path) => println!("Salvato in {}", path.display()),
                    Exported::Url(url) => println!("Documento esterno: {}", url),
                }
            }
        }
        Ok(())
    }
}

/// Positions on the command line start at 1
fn index_of(position: u64) -> usize {
    usize::try_from(position.saturating_sub(1)).unwrap_or(usize::MAX)
}
