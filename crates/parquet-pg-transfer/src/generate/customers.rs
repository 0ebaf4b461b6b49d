//! Customer records.

use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use chrono::{Duration, NaiveTime};
use fake::faker::address::en::{BuildingNumber, CityName, CountryName, StreetName, StreetSuffix};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use rand::Rng;
use rand_distr::{Exp, LogNormal};

use super::{distribution_error, GeneratorContext};
use crate::core::Dataset;
use crate::error::Result;

const SECTORS: [&str; 6] = [
    "Retail",
    "Healthcare",
    "Education",
    "Technology",
    "Finance",
    "Government",
];
const SECTOR_WEIGHTS: [f64; 6] = [0.25, 0.15, 0.15, 0.20, 0.15, 0.10];

const EDUCATION_LEVELS: [&str; 5] = [
    "High School",
    "Associate's Degree",
    "Bachelor's Degree",
    "Master's Degree",
    "Doctorate",
];
const EDUCATION_WEIGHTS: [f64; 5] = [0.2, 0.2, 0.25, 0.15, 0.2];

const EMPLOYMENT_STATUSES: [&str; 3] = ["Employed", "Unemployed", "Self-employed"];
const EMPLOYMENT_WEIGHTS: [f64; 3] = [0.7, 0.25, 0.05];

const DEFAULT_ON_FILE: [&str; 2] = ["Y", "N"];
const DEFAULT_ON_FILE_WEIGHTS: [f64; 2] = [0.1, 0.9];

const GENDERS: [&str; 2] = ["Male", "Female"];

/// One generated customer. Every field except the id may be null.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub customer_id: i64,
    pub name: Option<String>,
    pub gender: Option<String>,
    pub sector: Option<String>,
    /// Microseconds since the epoch.
    pub date_of_birth: Option<i64>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub income: Option<f64>,
    pub employment_status: Option<String>,
    pub years_of_employment: Option<i64>,
    pub cb_person_default_on_file: Option<String>,
    pub cb_preson_cred_hist_length: Option<i64>,
    pub education_level: Option<String>,
}

/// Generate `count` customers with distinct 8-digit ids.
pub fn generate_customers(ctx: &mut GeneratorContext, count: usize) -> Result<Vec<Customer>> {
    let age_years = LogNormal::<f64>::new(30f64.ln(), 0.25).map_err(distribution_error)?;
    let tenure = Exp::<f64>::new(1.0 / 5.0).map_err(distribution_error)?;
    let credit_history = LogNormal::<f64>::new(0.5, 1.0).map_err(distribution_error)?;
    let midnight = ctx.today().and_time(NaiveTime::MIN);

    let mut seen = HashSet::with_capacity(count);
    let mut customers = Vec::with_capacity(count);

    while customers.len() < count {
        let customer_id = ctx.int_between(10_000_000, 99_999_999);
        if !seen.insert(customer_id) {
            continue;
        }

        let name: String = Name().fake_with_rng(ctx.rng());
        let gender = ctx.choose(&GENDERS).to_string();
        let sector = ctx.weighted(&SECTORS, &SECTOR_WEIGHTS)?.to_string();

        let years = ctx.rng().sample(age_years).clamp(18.0, 140.0) as i64;
        let date_of_birth = (midnight - Duration::days(years * 365))
            .and_utc()
            .timestamp_micros();

        let building: String = BuildingNumber().fake_with_rng(ctx.rng());
        let street: String = StreetName().fake_with_rng(ctx.rng());
        let suffix: String = StreetSuffix().fake_with_rng(ctx.rng());
        let address = format!("{} {} {}", building, street, suffix);
        let city: String = CityName().fake_with_rng(ctx.rng());
        let country: String = CountryName().fake_with_rng(ctx.rng());
        let phone_number: String = PhoneNumber().fake_with_rng(ctx.rng());
        let email: String = SafeEmail().fake_with_rng(ctx.rng());

        let income = round2(ctx.triangular(4000.0, 200_000.0, 13_000.0));
        let employment_status = ctx
            .weighted(&EMPLOYMENT_STATUSES, &EMPLOYMENT_WEIGHTS)?
            .to_string();
        let years_of_employment = ctx.rng().sample(tenure).round() as i64;
        let default_on_file = ctx
            .weighted(&DEFAULT_ON_FILE, &DEFAULT_ON_FILE_WEIGHTS)?
            .to_string();
        let cred_hist_length = ctx
            .rng()
            .sample(credit_history)
            .clamp(0.0, 30.0)
            .round() as i64;
        let education_level = ctx
            .weighted(&EDUCATION_LEVELS, &EDUCATION_WEIGHTS)?
            .to_string();

        customers.push(Customer {
            customer_id,
            name: ctx.nullable(name),
            gender: ctx.nullable(gender),
            sector: ctx.nullable(sector),
            date_of_birth: ctx.nullable(date_of_birth),
            address: ctx.nullable(address),
            city: ctx.nullable(city),
            country: ctx.nullable(country),
            phone_number: ctx.nullable(phone_number),
            email: ctx.nullable(email),
            income: ctx.nullable(income),
            employment_status: ctx.nullable(employment_status),
            years_of_employment: ctx.nullable(years_of_employment),
            cb_person_default_on_file: ctx.nullable(default_on_file),
            cb_preson_cred_hist_length: ctx.nullable(cred_hist_length),
            education_level: ctx.nullable(education_level),
        });
    }

    Ok(customers)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Arrow schema of the `customers` dataset.
pub fn customers_schema() -> Schema {
    let text = |name: &str| Field::new(name, DataType::Utf8, true);
    Schema::new(vec![
        Field::new("customer_id", DataType::Int64, false),
        text("name"),
        text("gender"),
        text("sector"),
        Field::new(
            "date_of_birth",
            DataType::Timestamp(TimeUnit::Microsecond, None),
            true,
        ),
        text("address"),
        text("city"),
        text("country"),
        text("phone_number"),
        text("email"),
        Field::new("income", DataType::Float64, true),
        text("employment_status"),
        Field::new("years_of_employment", DataType::Int64, true),
        text("cb_person_default_on_file"),
        Field::new("cb_preson_cred_hist_length", DataType::Int64, true),
        text("education_level"),
    ])
}

/// Build the `customers` dataset.
pub fn customers_dataset(rows: &[Customer]) -> Result<Dataset> {
    let text = |f: fn(&Customer) -> &Option<String>| -> ArrayRef {
        Arc::new(StringArray::from(
            rows.iter().map(|r| f(r).clone()).collect::<Vec<_>>(),
        ))
    };

    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(
            rows.iter().map(|r| r.customer_id),
        )),
        text(|r| &r.name),
        text(|r| &r.gender),
        text(|r| &r.sector),
        Arc::new(TimestampMicrosecondArray::from(
            rows.iter().map(|r| r.date_of_birth).collect::<Vec<_>>(),
        )),
        text(|r| &r.address),
        text(|r| &r.city),
        text(|r| &r.country),
        text(|r| &r.phone_number),
        text(|r| &r.email),
        Arc::new(Float64Array::from(
            rows.iter().map(|r| r.income).collect::<Vec<_>>(),
        )),
        text(|r| &r.employment_status),
        Arc::new(Int64Array::from(
            rows.iter().map(|r| r.years_of_employment).collect::<Vec<_>>(),
        )),
        text(|r| &r.cb_person_default_on_file),
        Arc::new(Int64Array::from(
            rows.iter()
                .map(|r| r.cb_preson_cred_hist_length)
                .collect::<Vec<_>>(),
        )),
        text(|r| &r.education_level),
    ];

    Dataset::try_new(Arc::new(customers_schema()), columns)
}
