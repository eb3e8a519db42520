//! SEPA price archive processing
//!
//! A daily SEPA archive contains per-store `productos.csv` files with
//! pipe-delimited product rows. Individual product prices are too
//! granular to publish one stream each, so rows are aggregated into an
//! average list price per product id, one point per archive date.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use chrono::NaiveDate;
use tracing::{debug, warn};
use tsn_pipeline::{
    DateRule, FetchError, FieldSpec, FieldType, MappingRule, RawRecord, Schema, SourceSpec,
    StreamIdRule,
};
use zip::ZipArchive;

struct PriceAgg {
    description: String,
    sum: f64,
    count: u64,
}

/// Read a SEPA daily archive and aggregate prices per product id
///
/// Only `productos.csv` members are considered. Rows with a missing or
/// unparseable list price are skipped with a warning; an archive with
/// no usable rows is an error.
pub fn read_sepa_zip(bytes: &[u8], date: NaiveDate) -> Result<Vec<RawRecord>, FetchError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| FetchError::Format(format!("unreadable ZIP archive: {}", e)))?;

    let mut aggregates: BTreeMap<String, PriceAgg> = BTreeMap::new();
    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|e| FetchError::Format(format!("unreadable ZIP member: {}", e)))?;

        if !file.name().ends_with("productos.csv") {
            continue;
        }

        let member_name = file.name().to_string();
        let mut body = String::new();
        file.read_to_string(&mut body)
            .map_err(|e| FetchError::Format(format!("unreadable {}: {}", member_name, e)))?;

        debug!(member = %member_name, "Aggregating SEPA product prices");
        aggregate_member(&member_name, &body, &mut aggregates);
    }

    if aggregates.is_empty() {
        return Err(FetchError::Format(
            "archive contains no usable productos.csv rows".to_string(),
        ));
    }

    let date_string = date.to_string();
    let records = aggregates
        .into_iter()
        .map(|(id, agg)| {
            RawRecord::new()
                .with_field("category_id", id)
                .with_field("description", agg.description)
                .with_field("avg_price", agg.sum / agg.count as f64)
                .with_field("date", date_string.clone())
        })
        .collect();

    Ok(records)
}

fn aggregate_member(member: &str, body: &str, aggregates: &mut BTreeMap<String, PriceAgg>) {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => {
            warn!(member = %member, error = %e, "Skipping member with unreadable headers");
            return;
        },
    };
    let id_col = headers.iter().position(|h| h == "id_producto");
    let desc_col = headers.iter().position(|h| h == "productos_descripcion");
    let price_col = headers.iter().position(|h| h == "productos_precio_lista");
    let (Some(id_col), Some(desc_col), Some(price_col)) = (id_col, desc_col, price_col) else {
        warn!(member = %member, "Skipping member without expected product columns");
        return;
    };

    for row in reader.records() {
        // Real archives end with footer lines that are not records
        let Ok(row) = row else { continue };

        let id = row.get(id_col).unwrap_or("").trim();
        if id.is_empty() {
            continue;
        }
        let Some(price) = row.get(price_col).and_then(|v| v.trim().parse::<f64>().ok()) else {
            continue;
        };

        let agg = aggregates.entry(id.to_string()).or_insert_with(|| PriceAgg {
            description: row.get(desc_col).unwrap_or("").trim().to_string(),
            sum: 0.0,
            count: 0,
        });
        agg.sum += price;
        agg.count += 1;
    }
}

/// Declared schema for aggregated SEPA records
pub fn sepa_schema() -> Schema {
    Schema::new(vec![
        FieldSpec::required("category_id", FieldType::String),
        FieldSpec::optional("description", FieldType::String),
        FieldSpec::required("avg_price", FieldType::Float),
        FieldSpec::required("date", FieldType::Date),
    ])
}

/// Mapping onto per-category streams
///
/// Stream ids derive from the product category so every category gets
/// a stable stream across runs.
pub fn sepa_mapping() -> MappingRule {
    MappingRule {
        stream_id: StreamIdRule::Derived {
            prefix: Some("arg-sepa".to_string()),
            fields: vec!["category_id".to_string()],
        },
        date: DateRule::Field("date".to_string()),
        value_field: "avg_price".to_string(),
        filter: None,
        metadata_fields: vec!["category_id".to_string(), "description".to_string()],
    }
}

/// Complete source spec for the SEPA source
pub fn sepa_spec() -> SourceSpec {
    SourceSpec {
        name: "argentina-sepa".to_string(),
        schema: sepa_schema(),
        mapping: sepa_mapping(),
    }
}
