//! Write-time validation contracts
//!
//! Records are validated when a service changes them, never on load.

use cm_core::error::ValidationErrors;
use cm_models::furniture::FurnitureItem;
use cm_models::invoice::Invoice;
use cm_models::material::MaterialOrder;
use cm_models::work_order::WorkOrder;
use regex::Regex;
use std::sync::LazyLock;
use validator::Validate;

pub type ValidationResult = Result<(), ValidationErrors>;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

/// Italian VAT number, with or without the country prefix
static VAT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i:IT)?[0-9]{11}$").unwrap()
});

pub trait Contract<T>: Send + Sync {
    fn validate(&self, entity: &T) -> ValidationResult;
}

/// Copy derive-level errors into `errors`, prefixing field names
fn merge_derived(result: Result<(), validator::ValidationErrors>, prefix: &str, errors: &mut ValidationErrors) {
    let Err(derived) = result else {
        return;
    };
    for (field, list) in derived.field_errors() {
        for error in list {
            let message = match error.code.as_ref() {
                "length" => "has an invalid length".to_string(),
                "range" => match (error.params.get("min"), error.params.get("max")) {
                    (Some(min), Some(max)) => format!("must be between {} and {}", min, max),
                    (Some(min), None) => format!("must be at least {}", min),
                    _ => "is out of range".to_string(),
                },
                other => format!("is invalid ({})", other),
            };
            errors.add(format!("{}{}", prefix, field), message);
        }
    }
}

pub struct InvoiceContract;

impl InvoiceContract {
    fn check(&self, invoice: &Invoice, prefix: &str, errors: &mut ValidationErrors) {
        merge_derived(invoice.validate(), prefix, errors);
        if invoice.percentage.is_some_and(|p| !p.is_finite()) {
            errors.add(format!("{}percentage", prefix), "is not a number");
        }
        if invoice.amount.is_some_and(|a| !a.is_finite()) {
            errors.add(format!("{}amount", prefix), "is not a number");
        }
    }
}

impl Contract<Invoice> for InvoiceContract {
    fn validate(&self, invoice: &Invoice) -> ValidationResult {
        let mut errors = ValidationErrors::new();
        self.check(invoice, "", &mut errors);
        errors.into_result()
    }
}

pub struct MaterialOrderContract;

impl MaterialOrderContract {
    fn check(&self, order: &MaterialOrder, prefix: &str, errors: &mut ValidationErrors) {
        if order.supplier.trim().is_empty() {
            errors.add(format!("{}supplier", prefix), "can't be blank");
        }
        merge_derived(order.validate(), prefix, errors);
        for (i, line) in order.lines.iter().enumerate() {
            merge_derived(line.validate(), &format!("{}lines[{}].", prefix, i), errors);
        }
    }
}

impl Contract<MaterialOrder> for MaterialOrderContract {
    fn validate(&self, order: &MaterialOrder) -> ValidationResult {
        let mut errors = ValidationErrors::new();
        self.check(order, "", &mut errors);
        errors.into_result()
    }
}

pub struct FurnitureItemContract;

impl FurnitureItemContract {
    fn check(&self, item: &FurnitureItem, prefix: &str, errors: &mut ValidationErrors) {
        merge_derived(item.validate(), prefix, errors);
        if item.phase.is_terminal() {
            errors.add(format!("{}phase", prefix), "can't be the payment phase");
        }
        for (i, order) in item.orders.iter().enumerate() {
            MaterialOrderContract.check(order, &format!("{}orders[{}].", prefix, i), errors);
        }
    }
}

impl Contract<FurnitureItem> for FurnitureItemContract {
    fn validate(&self, item: &FurnitureItem) -> ValidationResult {
        let mut errors = ValidationErrors::new();
        self.check(item, "", &mut errors);
        errors.into_result()
    }
}

/// Whole work order, nested entities included
pub struct WorkOrderContract;

impl WorkOrderContract {
    pub fn validate_email(&self, email: &str, errors: &mut ValidationErrors) {
        if !email.is_empty() && !EMAIL_PATTERN.is_match(email) {
            errors.add("client.email", "is not a valid email address");
        }
    }

    pub fn validate_tax_id(&self, tax_id: &str, errors: &mut ValidationErrors) {
        let compact: String = tax_id.chars().filter(|c| !c.is_whitespace()).collect();
        // fiscal codes (16 chars) are accepted as entered
        if compact.is_empty() || compact.len() == 16 {
            return;
        }
        if !VAT_PATTERN.is_match(&compact) {
            errors.add("client.tax_id", "is not a valid VAT number");
        }
    }
}

impl Contract<WorkOrder> for WorkOrderContract {
    fn validate(&self, order: &WorkOrder) -> ValidationResult {
        let mut errors = ValidationErrors::new();

        if order.name.trim().is_empty() {
            errors.add("name", "can't be blank");
        } else {
            merge_derived(order.validate(), "", &mut errors);
        }
        self.validate_email(order.client.email.trim(), &mut errors);
        self.validate_tax_id(&order.client.tax_id, &mut errors);
        if order.quote.amount.is_some_and(|a| a < 0.0) {
            errors.add("quote.amount", "must be at least 0");
        }

        for (i, invoice) in order.invoices.iter().enumerate() {
            InvoiceContract.check(invoice, &format!("invoices[{}].", i), &mut errors);
        }
        for (i, item) in order.items.iter().enumerate() {
            FurnitureItemContract.check(item, &format!("items[{}].", i), &mut errors);
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_work_order() {
        let mut order = WorkOrder::new("Cucina Rossi");
        order.client.email = "rossi@example.com".into();
        order.client.tax_id = "IT01234567890".into();
        order.invoices.push(Invoice::new().with_percentage(30.0).with_amount(1500.0));
        assert!(WorkOrderContract.validate(&order).is_ok());
    }

    #[test]
    fn test_blank_name() {
        let order = WorkOrder::new("   ");
        let errors = WorkOrderContract.validate(&order).unwrap_err();
        assert!(errors.has_error("name"));
    }

    #[test]
    fn test_bad_email_and_vat() {
        let mut order = WorkOrder::new("Cucina");
        order.client.email = "not-an-email".into();
        order.client.tax_id = "12345".into();
        let errors = WorkOrderContract.validate(&order).unwrap_err();
        assert!(errors.has_error("client.email"));
        assert!(errors.has_error("client.tax_id"));
    }

    #[test]
    fn test_fiscal_code_accepted() {
        let mut order = WorkOrder::new("Cucina");
        order.client.tax_id = "RSSMRA80A01H501U".into();
        assert!(WorkOrderContract.validate(&order).is_ok());
    }

    #[test]
    fn test_invoice_percentage_out_of_range() {
        let invoice = Invoice::new().with_percentage(120.0);
        let errors = InvoiceContract.validate(&invoice).unwrap_err();
        assert!(errors.has_error("percentage"));

        let mut order = WorkOrder::new("Cucina");
        order.invoices.push(invoice);
        let errors = WorkOrderContract.validate(&order).unwrap_err();
        assert!(errors.has_error("invoices[0].percentage"));
    }

    #[test]
    fn test_blank_supplier() {
        let mut item = FurnitureItem::new("Base");
        item.orders.push(MaterialOrder::new(" "));
        let errors = FurnitureItemContract.validate(&item).unwrap_err();
        assert!(errors.has_error("orders[0].supplier"));
    }
}
