//! TSN Ingest Library
//!
//! Source integrations for publishing external datasets into TSN
//! streams.
//!
//! # Supported Data Sources
//!
//! - **gsheet**: Google Sheets via the public CSV export endpoint
//! - **github**: CSV files hosted in GitHub repositories (also used
//!   for the primitive-sources table driving multi-source runs)
//! - **argentina**: SEPA precios scraper (datos.produccion.gob.ar)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tsn_ingest::gsheet::{sheet_spec, GsheetFetcher};
//! use tsn_pipeline::{HttpTsnClient, PipelineRunner};
//! use tsn_common::StreamId;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Arc::new(HttpTsnClient::from_env()?);
//!     let runner = PipelineRunner::new(client);
//!
//!     let stream_id = StreamId::generate("gsheets-direct-flow-stream");
//!     let spec = sheet_spec("gsheet-demo", stream_id, "1.1.01");
//!     let fetcher = GsheetFetcher::new("1WE3Sw_ZZ4IyJmcqG5BTTtAMX6qRX0_k8dBlnH2se7dI")?;
//!
//!     let summary = runner.run(&spec, &fetcher).await;
//!     println!("run outcome: {:?}", summary.outcome);
//!     Ok(())
//! }
//! ```

pub mod argentina;
pub mod csv_records;
pub mod github;
pub mod gsheet;
pub mod sources;
