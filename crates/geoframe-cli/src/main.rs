//! CLI tool for inspecting and reshaping geospatial tables.

mod error;
mod preview;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use geoframe_core::{
    crs::Crs,
    frame::{AggFunc, By},
    geo_frame::{DissolveOptions, ExplodeOptions, GeoDataFrame, Table},
    geometry::kernel::UnionMethod,
    io::{FileOptions, SchemaVersion},
};
use snafu::ResultExt;

use crate::error::{
    CliError, CliResult, InvalidAggregationSnafu, InvalidCrsSnafu, InvalidSchemaVersionSnafu,
    OperationSnafu, ReadTableSnafu, WriteTableSnafu,
};

#[derive(Debug, Subcommand)]
enum Command {
    /// Print row count, columns, active geometry, CRS and bounds
    Info { input: PathBuf },

    /// Preview the first rows with geometry as WKT
    Head {
        input: PathBuf,

        #[arg(long, default_value_t = 10)]
        rows: usize,
    },

    /// Rewrite a table in the format implied by the output extension
    Convert {
        input: PathBuf,
        output: PathBuf,

        /// GeoParquet metadata version: 0.1.0, 0.4.0, 1.0.0 or 1.1.0
        #[arg(long = "schema-version")]
        schema_version: Option<String>,
    },

    /// Reproject the active geometry
    ToCrs {
        input: PathBuf,
        output: PathBuf,

        /// Target CRS, e.g. EPSG:3857
        #[arg(long)]
        crs: String,
    },

    /// Union geometries per group and aggregate the other columns
    Dissolve {
        input: PathBuf,
        output: PathBuf,

        /// Repeatable grouping column; omit to dissolve everything
        #[arg(long = "by")]
        by: Vec<String>,

        /// first, last, sum, mean, min, max or count
        #[arg(long, default_value = "first")]
        agg: String,

        /// unary, coverage or disjoint-subset
        #[arg(long, default_value = "unary")]
        method: String,

        #[arg(long = "grid-size")]
        grid_size: Option<f64>,
    },

    /// Split multi-part geometries into one row per part
    Explode {
        input: PathBuf,
        output: PathBuf,

        #[arg(long = "ignore-index", default_value_t = false)]
        ignore_index: bool,

        /// Do not append the part number as an index level
        #[arg(long = "no-index-parts", default_value_t = false)]
        no_index_parts: bool,
    },
}

#[derive(Debug, Parser)]
#[command(name = "geoframe", version, about)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

fn read_table(path: &Path) -> CliResult<GeoDataFrame> {
    GeoDataFrame::from_file(path).context(ReadTableSnafu {
        path: path.display().to_string(),
    })
}

fn write_table(gdf: &GeoDataFrame, path: &Path, opts: &FileOptions) -> CliResult<()> {
    gdf.to_file(path, opts).context(WriteTableSnafu {
        path: path.display().to_string(),
    })?;
    println!("Wrote {} rows to {}", gdf.nrows(), path.display());
    Ok(())
}

fn cmd_info(input: &Path) -> CliResult<()> {
    let gdf = read_table(input)?;
    for line in preview::describe(&gdf) {
        println!("{line}");
    }
    Ok(())
}

fn cmd_head(input: &Path, rows: usize) -> CliResult<()> {
    let gdf = read_table(input)?;
    if gdf.nrows() == 0 {
        println!("(no rows)");
        return Ok(());
    }
    println!("{}", preview::render_head(&gdf, rows)?);
    Ok(())
}

fn cmd_convert(input: &Path, output: &Path, schema_version: Option<String>) -> CliResult<()> {
    let mut opts = FileOptions::default();
    if let Some(spec) = schema_version {
        let version = spec
            .parse::<SchemaVersion>()
            .context(InvalidSchemaVersionSnafu { spec: spec.clone() })?;
        opts = opts.with_schema_version(version);
    }
    let gdf = read_table(input)?;
    write_table(&gdf, output, &opts)
}

fn cmd_to_crs(input: &Path, output: &Path, crs: &str) -> CliResult<()> {
    let target = Crs::parse(crs).context(InvalidCrsSnafu { spec: crs })?;
    let gdf = read_table(input)?;
    let projected = gdf
        .to_crs(&target)
        .context(OperationSnafu { operation: "to-crs" })?;
    write_table(&projected, output, &FileOptions::default())
}

struct DissolveArgs {
    by: Vec<String>,
    agg: String,
    method: String,
    grid_size: Option<f64>,
}

fn cmd_dissolve(input: &Path, output: &Path, args: DissolveArgs) -> CliResult<()> {
    let aggfunc = args
        .agg
        .parse::<AggFunc>()
        .context(InvalidAggregationSnafu { spec: args.agg.clone() })?;
    let method = args
        .method
        .parse::<UnionMethod>()
        .map_err(|message| CliError::InvalidMethod { message })?;
    let by = if args.by.is_empty() {
        By::None
    } else {
        By::Columns(args.by)
    };
    let mut opts = DissolveOptions::default()
        .with_by(by)
        .with_aggfunc(aggfunc)
        .with_method(method);
    if let Some(grid_size) = args.grid_size {
        opts = opts.with_grid_size(grid_size);
    }

    let gdf = read_table(input)?;
    let dissolved = gdf
        .dissolve(&opts)
        .context(OperationSnafu { operation: "dissolve" })?;
    write_table(&dissolved, output, &FileOptions::default())
}

fn cmd_explode(
    input: &Path,
    output: &Path,
    ignore_index: bool,
    no_index_parts: bool,
) -> CliResult<()> {
    let opts = ExplodeOptions::default()
        .with_ignore_index(ignore_index)
        .with_index_parts(!no_index_parts);
    let gdf = read_table(input)?;
    let exploded = gdf
        .explode(&opts)
        .context(OperationSnafu { operation: "explode" })?;
    match exploded {
        Table::Geo(out) => write_table(&out, output, &FileOptions::default()),
        Table::Plain(_) => Err(CliError::NoGeometry {
            operation: "explode",
        }),
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Info { input } => cmd_info(&input),
        Command::Head { input, rows } => cmd_head(&input, rows),
        Command::Convert {
            input,
            output,
            schema_version,
        } => cmd_convert(&input, &output, schema_version),
        Command::ToCrs { input, output, crs } => cmd_to_crs(&input, &output, &crs),
        Command::Dissolve {
            input,
            output,
            by,
            agg,
            method,
            grid_size,
        } => cmd_dissolve(
            &input,
            &output,
            DissolveArgs {
                by,
                agg,
                method,
                grid_size,
            },
        ),
        Command::Explode {
            input,
            output,
            ignore_index,
            no_index_parts,
        } => cmd_explode(&input, &output, ignore_index, no_index_parts),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    if let Err(e) = run() {
        eprintln!("{e}");
        if let Some(source) = std::error::Error::source(&e) {
            eprintln!("  caused by: {source}");
        }
        std::process::exit(1);
    }
}
