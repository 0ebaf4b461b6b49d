//! Loan records referencing generated customers.

use std::sync::Arc;

use arrow::array::{ArrayRef, Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use chrono::Duration;
use rand::Rng;
use uuid::Builder;

use super::{date32, Customer, GeneratorContext};
use crate::core::Dataset;
use crate::error::{Result, TransferError};

const LOAN_INTENTS: [&str; 8] = [
    "Personal",
    "Mortgage",
    "Education",
    "Business",
    "Medical",
    "Venture",
    "Home improvement",
    "Debt consolidation",
];
const LOAN_INTENT_WEIGHTS: [f64; 8] = [10.0, 20.0, 15.0, 15.0, 5.0, 5.0, 10.0, 20.0];

const REPAYMENT_METHODS: [&str; 2] = ["Monthly", "Bi-weekly"];

/// One generated loan. `loan_id` and `customer_id` are never null.
#[derive(Debug, Clone, PartialEq)]
pub struct Loan {
    pub loan_id: String,
    pub customer_id: i64,
    pub loan_amount: Option<i64>,
    pub interest_rate: Option<f64>,
    /// Days since the epoch.
    pub start_date: Option<i32>,
    pub end_date: Option<i32>,
    /// 1 = active, 0 = closed.
    pub status: Option<i64>,
    pub loan_intent: Option<String>,
    pub credit_score: Option<i64>,
    pub loan_term: Option<i64>,
    pub loan_grade: Option<String>,
    pub repayment_method: Option<String>,
    pub collateral_value: Option<i64>,
    pub loan_purpose: Option<String>,
}

/// Generate `count` loans for randomly chosen `customers`.
///
/// Amount, credit score and collateral scale with the customer's income when known.
pub fn generate_loans(
    ctx: &mut GeneratorContext,
    count: usize,
    customers: &[Customer],
) -> Result<Vec<Loan>> {
    if count > 0 && customers.is_empty() {
        return Err(TransferError::Config(
            "cannot generate loans without customers".into(),
        ));
    }

    let today = ctx.today();
    let mut loans = Vec::with_capacity(count);

    for _ in 0..count {
        let loan_id = Builder::from_random_bytes(ctx.rng().gen())
            .into_uuid()
            .to_string();
        let customer = ctx.choose(customers);
        let interest_rate = (ctx.float_between(2.0, 12.0) * 100.0).round() / 100.0;

        let start = today - Duration::days(ctx.int_between(0, 730));
        let end = start + Duration::days(ctx.int_between(180, 1095));

        let active_weight = ctx.float_between(0.0, 0.3);
        let closed_weight = 1.0 - ctx.float_between(0.0, 0.3);
        let status = *ctx.weighted(&[1i64, 0], &[active_weight, closed_weight])?;

        let loan_intent = *ctx.weighted(&LOAN_INTENTS, &LOAN_INTENT_WEIGHTS)?;

        let (credit_score, collateral_value, loan_amount) = match customer.income {
            Some(income) if income > 0.0 => {
                let score = ctx.triangular(0.005 * income, 0.012 * income, 0.008 * income);
                let collateral = ctx.triangular(0.0, 0.2 * income, 0.5 * income);
                let amount = ctx.triangular(0.2 * income, 0.5 * income, 0.8 * income);
                (
                    (score as i64).clamp(300, 800),
                    (collateral as i64).clamp(0, 50_000),
                    amount.round() as i64,
                )
            }
            _ => (
                ctx.int_between(600, 800),
                ctx.int_between(0, 50_000),
                ctx.int_between(1000, 50_000),
            ),
        };

        let loan_term = ctx.int_between(12, 60);
        let repayment_method = ctx.choose(&REPAYMENT_METHODS).to_string();
        let loan_purpose = loan_purpose(ctx, loan_intent);
        let loan_grade = loan_grade(ctx, credit_score);

        loans.push(Loan {
            loan_id,
            customer_id: customer.customer_id,
            loan_amount: ctx.nullable(loan_amount),
            interest_rate: ctx.nullable(interest_rate),
            start_date: ctx.nullable(date32(start)),
            end_date: ctx.nullable(date32(end)),
            status: ctx.nullable(status),
            loan_intent: ctx.nullable(loan_intent.to_string()),
            credit_score: ctx.nullable(credit_score),
            loan_term: ctx.nullable(loan_term),
            loan_grade: ctx.nullable(loan_grade.to_string()),
            repayment_method: ctx.nullable(repayment_method),
            collateral_value: ctx.nullable(collateral_value),
            loan_purpose: ctx.nullable(loan_purpose.to_string()),
        });
    }

    Ok(loans)
}

fn loan_purpose(ctx: &mut GeneratorContext, intent: &str) -> &'static str {
    match intent {
        "Personal" => *ctx.choose(&["Home Renovation", "Vacation", "Wedding", "Debt Consolidation"]),
        "Mortgage" => "Home Purchase",
        "Business" => *ctx.choose(&["Startup Capital", "Expansion", "Equipment Purchase"]),
        "Education" => "Tuition Fees",
        _ => "Other",
    }
}

fn loan_grade(ctx: &mut GeneratorContext, credit_score: i64) -> &'static str {
    if credit_score >= 750 {
        "A"
    } else if credit_score >= 700 {
        *ctx.choose(&["A", "B"])
    } else if credit_score >= 650 {
        *ctx.choose(&["B", "C"])
    } else if credit_score >= 600 {
        *ctx.choose(&["C", "D"])
    } else {
        *ctx.choose(&["D", "E", "F", "G"])
    }
}

/// Arrow schema of the `loans` dataset.
pub fn loans_schema() -> Schema {
    let int = |name: &str| Field::new(name, DataType::Int64, true);
    let text = |name: &str| Field::new(name, DataType::Utf8, true);
    Schema::new(vec![
        Field::new("loan_id", DataType::Utf8, false),
        Field::new("customer_id", DataType::Int64, false),
        int("loan_amount"),
        Field::new("interest_rate", DataType::Float64, true),
        Field::new("start_date", DataType::Date32, true),
        Field::new("end_date", DataType::Date32, true),
        int("status"),
        text("loan_intent"),
        int("credit_score"),
        int("loan_term"),
        text("loan_grade"),
        text("repayment_method"),
        int("collateral_value"),
        text("loan_purpose"),
    ])
}

/// Build the `loans` dataset.
pub fn loans_dataset(rows: &[Loan]) -> Result<Dataset> {
    let int = |f: fn(&Loan) -> Option<i64>| -> ArrayRef {
        Arc::new(Int64Array::from(rows.iter().map(f).collect::<Vec<_>>()))
    };
    let text = |f: fn(&Loan) -> &Option<String>| -> ArrayRef {
        Arc::new(StringArray::from(
            rows.iter().map(|r| f(r).clone()).collect::<Vec<_>>(),
        ))
    };
    let date = |f: fn(&Loan) -> Option<i32>| -> ArrayRef {
        Arc::new(Date32Array::from(rows.iter().map(f).collect::<Vec<_>>()))
    };

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.loan_id.as_str()),
        )),
        Arc::new(Int64Array::from_iter_values(
            rows.iter().map(|r| r.customer_id),
        )),
        int(|r| r.loan_amount),
        Arc::new(Float64Array::from(
            rows.iter().map(|r| r.interest_rate).collect::<Vec<_>>(),
        )),
        date(|r| r.start_date),
        date(|r| r.end_date),
        int(|r| r.status),
        text(|r| &r.loan_intent),
        int(|r| r.credit_score),
        int(|r| r.loan_term),
        text(|r| &r.loan_grade),
        text(|r| &r.repayment_method),
        int(|r| r.collateral_value),
        text(|r| &r.loan_purpose),
    ];

    Dataset::try_new(Arc::new(loans_schema()), columns)
}
