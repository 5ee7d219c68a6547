//! Invoice model
//!
//! An invoice bills a percentage of the work order total.

use chrono::NaiveDate;
use cm_core::types::{new_record_id, RecordId};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Default)]
pub struct Invoice {
    pub id: RecordId,

    /// Invoice number as printed
    #[serde(rename = "numero", default)]
    pub number: String,

    /// Issue date
    #[serde(rename = "data", default)]
    pub date: Option<NaiveDate>,

    #[serde(rename = "importo", default)]
    #[validate(range(min = 0.0))]
    pub amount: Option<f64>,

    /// Share of the work order total, 0-100
    #[serde(rename = "percentuale", default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub percentage: Option<f64>,

    #[serde(rename = "pagata", default)]
    pub paid: bool,

    #[serde(rename = "dataPagamento", default)]
    pub payment_date: Option<NaiveDate>,

    #[serde(default)]
    pub note: String,
}

impl Invoice {
    pub fn new() -> Self {
        Self {
            id: new_record_id(),
            ..Default::default()
        }
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.number = number.into();
        self
    }

    pub fn with_percentage(mut self, percentage: f64) -> Self {
        self.percentage = Some(percentage);
        self
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Update the paid flag.
    ///
    /// Marking paid stamps `today` as payment date only when none is set.
    /// The payment date is never cleared here, not even when unpaying.
    pub fn set_paid(&mut self, paid: bool, today: NaiveDate) {
        self.paid = paid;
        if paid && self.payment_date.is_none() {
            self.payment_date = Some(today);
        }
    }

    /// Percentage counted towards totals (missing counts as zero)
    pub fn weight(&self) -> f64 {
        self.percentage.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_set_paid_stamps_date_once() {
        let mut invoice = Invoice::new().with_percentage(30.0);
        invoice.set_paid(true, day(1));
        assert_eq!(invoice.payment_date, Some(day(1)));

        // unpay keeps the date
        invoice.set_paid(false, day(2));
        assert!(!invoice.paid);
        assert_eq!(invoice.payment_date, Some(day(1)));

        // re-pay does not overwrite it
        invoice.set_paid(true, day(3));
        assert_eq!(invoice.payment_date, Some(day(1)));
    }

    #[test]
    fn test_validation_ranges() {
        let invoice = Invoice::new().with_percentage(120.0);
        let errors = invoice.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("percentage"));

        let invoice = Invoice::new().with_amount(-5.0);
        assert!(invoice.validate().is_err());

        let invoice = Invoice::new().with_percentage(40.0).with_amount(1200.0);
        assert!(invoice.validate().is_ok());
    }

    #[test]
    fn test_wire_names() {
        let mut invoice = Invoice::new().with_number("12/2024");
        invoice.set_paid(true, day(5));
        let value = serde_json::to_value(&invoice).unwrap();
        assert_eq!(value["numero"], "12/2024");
        assert_eq!(value["pagata"], true);
        assert_eq!(value["dataPagamento"], "2024-03-05");
    }
}
