//! Materializing cached files into SQLite tables.
//!
//! Every load runs in one transaction. A failure anywhere rolls it back, so
//! a half-written table is never visible.

use std::fs::File;
use std::io::BufRead;
use std::path::Path;

use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use rusqlite::{params, params_from_iter, Connection};
use tracing::{info, warn};

use super::Relation;
use crate::cache::CacheManager;
use crate::catalog::{Family, ViewSpec};
use crate::config::IngestSettings;
use crate::error::{Error, Result};
use crate::schema::{infer_shape_detailed, sample, ShapeInference};
use crate::transform::columns::{self, Encoding};
use crate::transform::legalities::{self, UnpivotPlan};
use crate::transform::prices::{self, PRICE_COLUMNS};

/// Quote an identifier for SQLite.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Fetch (if needed) and load the file behind `spec` into a table named
/// after the view.
///
/// A file that fails to parse is removed from the cache before the error is
/// returned, so the next attempt downloads it again.
pub fn materialize(
    conn: &mut Connection,
    cache: &mut CacheManager,
    spec: &ViewSpec,
    generation: u64,
    ingest: &IngestSettings,
) -> Result<Relation> {
    let result = match spec.family {
        Family::Columnar | Family::Legalities => {
            let path = cache.ensure_file(spec.name)?;
            load_parquet(conn, spec, &path, generation, ingest)
        }
        Family::Prices => {
            let reader = cache.open_reader(spec.name)?;
            load_prices(conn, spec, reader, generation)
        }
    };

    match result {
        Ok(relation) => {
            info!(
                view = spec.name,
                rows = relation.row_count,
                columns = relation.columns.len(),
                "materialized view"
            );
            Ok(relation)
        }
        Err(Error::Parquet(e)) => Err(cache.discard_corrupt(spec.name, e.to_string()).into()),
        Err(Error::Json(e)) => Err(cache.discard_corrupt(spec.name, e.to_string()).into()),
        Err(Error::Arrow(ArrowError::ParquetError(reason))) => {
            Err(cache.discard_corrupt(spec.name, reason).into())
        }
        Err(e) => Err(e),
    }
}

/// Drop the backing tables of relations released by the registry.
pub fn drop_tables<'a>(
    conn: &Connection,
    relations: impl IntoIterator<Item = &'a Relation>,
) -> Result<()> {
    for rel in relations {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(&rel.table)))?;
    }
    Ok(())
}

fn load_parquet(
    conn: &mut Connection,
    spec: &ViewSpec,
    path: &Path,
    generation: u64,
    ingest: &IngestSettings,
) -> Result<Relation> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
    let schema = builder.schema().clone();
    let mut reader = builder.with_batch_size(ingest.batch_size.max(1)).build()?;

    // The first batch doubles as the inference sample
    let first = reader.next().transpose()?;
    let inference = first_inference(spec, &schema, first.as_ref(), ingest)?;
    let batches = first.into_iter().map(Ok).chain(reader);

    if spec.family != Family::Legalities {
        return load_columnar(conn, spec, &schema, inference, batches, generation);
    }

    match UnpivotPlan::from_schema(spec.name, &schema) {
        plan @ UnpivotPlan::Unpivot { .. } => load_unpivoted(conn, spec, &plan, batches, generation),
        UnpivotPlan::PassThrough { warning } => {
            let mut rel = load_columnar(conn, spec, &schema, inference, batches, generation)?;
            if let Some(w) = warning {
                warn!(view = spec.name, "{w}");
                rel.warnings.push(w);
            }
            Ok(rel)
        }
    }
}

fn first_inference(
    spec: &ViewSpec,
    schema: &SchemaRef,
    first: Option<&RecordBatch>,
    ingest: &IngestSettings,
) -> Result<ShapeInference> {
    let desc = sample::describe(Some(spec.name), schema, first, ingest.sample_rows)?;
    Ok(infer_shape_detailed(&desc))
}

fn load_columnar(
    conn: &mut Connection,
    spec: &ViewSpec,
    schema: &SchemaRef,
    inference: ShapeInference,
    batches: impl Iterator<Item = std::result::Result<RecordBatch, ArrowError>>,
    generation: u64,
) -> Result<Relation> {
    let table = quote_ident(spec.name);
    let fields = schema.fields();
    let encodings: Vec<Encoding> = fields
        .iter()
        .map(|f| Encoding::for_column(f.data_type(), inference.is_array(f.name())))
        .collect();

    let defs: Vec<String> = fields
        .iter()
        .zip(&encodings)
        .map(|(f, enc)| {
            format!("{} {}", quote_ident(f.name()), columns::sql_type(f.data_type(), *enc))
                .trim_end()
                .to_string()
        })
        .collect();
    let names: Vec<String> = fields.iter().map(|f| quote_ident(f.name())).collect();
    let placeholders = vec!["?"; fields.len()].join(", ");

    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} ({});",
        defs.join(", ")
    ))?;

    let mut rows = 0u64;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            names.join(", ")
        ))?;
        for batch in batches {
            let batch = batch?;
            let encoded = encodings
                .iter()
                .enumerate()
                .map(|(i, enc)| columns::column_values(batch.column(i).as_ref(), *enc))
                .collect::<Result<Vec<_>>>()?;
            for row in 0..batch.num_rows() {
                stmt.execute(params_from_iter(encoded.iter().map(|col| &col[row])))?;
                rows += 1;
            }
        }
    }
    tx.commit()?;

    Ok(Relation {
        name: spec.name.to_string(),
        table: spec.name.to_string(),
        columns: fields.iter().map(|f| f.name().clone()).collect(),
        row_count: rows,
        generation,
        shapes: inference.shapes,
        warnings: inference.warnings,
    })
}

fn load_unpivoted(
    conn: &mut Connection,
    spec: &ViewSpec,
    plan: &UnpivotPlan,
    batches: impl Iterator<Item = std::result::Result<RecordBatch, ArrowError>>,
    generation: u64,
) -> Result<Relation> {
    let table = quote_ident(spec.name);
    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table};
         CREATE TABLE {table} (
             uuid TEXT NOT NULL,
             format TEXT NOT NULL,
             status TEXT NOT NULL,
             PRIMARY KEY (uuid, format)
         ) WITHOUT ROWID;"
    ))?;

    let mut rows = 0u64;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT OR REPLACE INTO {table} (uuid, format, status) VALUES (?, ?, ?)"
        ))?;
        for batch in batches {
            for row in plan.apply(&batch?)? {
                stmt.execute(params![row.card_uuid, row.format_name, row.status.as_str()])?;
                rows += 1;
            }
        }
    }
    tx.commit()?;

    Ok(Relation {
        name: spec.name.to_string(),
        table: spec.name.to_string(),
        columns: legalities::LONG_COLUMNS.iter().map(|c| c.to_string()).collect(),
        row_count: rows,
        generation,
        shapes: Default::default(),
        warnings: Vec::new(),
    })
}

fn load_prices(
    conn: &mut Connection,
    spec: &ViewSpec,
    reader: Box<dyn BufRead>,
    generation: u64,
) -> Result<Relation> {
    let table = quote_ident(spec.name);
    let index = quote_ident(&format!("{}_uuid", spec.name));
    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table};
         CREATE TABLE {table} (
             uuid TEXT NOT NULL,
             source TEXT,
             provider TEXT NOT NULL,
             currency TEXT,
             price_kind TEXT NOT NULL,
             finish TEXT NOT NULL,
             date TEXT NOT NULL,
             price REAL NOT NULL
         );"
    ))?;

    let stats = {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {table} (uuid, source, provider, currency, price_kind, finish, date, price)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        ))?;
        prices::stream_prices(reader, &mut |r| {
            stmt.execute(params![
                r.card_uuid,
                r.source,
                r.provider,
                r.currency,
                r.price_kind.as_str(),
                r.finish,
                r.date,
                r.value,
            ])?;
            Ok(())
        })?
    };
    tx.execute_batch(&format!("CREATE INDEX {index} ON {table} (uuid);"))?;
    tx.commit()?;

    Ok(Relation {
        name: spec.name.to_string(),
        table: spec.name.to_string(),
        columns: PRICE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        row_count: stats.records,
        generation,
        shapes: Default::default(),
        warnings: Vec::new(),
    })
}
