//! Text rendering of tables for the terminal.

use geoframe_core::geo_frame::GeoDataFrame;
use snafu::ResultExt;
use tabled::{
    builder::Builder,
    settings::{object::Rows, style::LineText, width::MinWidth, Style},
};

use crate::error::{CliResult, RenderSnafu};

const PREVIEW_LABEL: &str = "Preview output";
const PREVIEW_OFFSET: usize = 6;

pub fn render_table(columns: &[String], rows: &[Vec<String>]) -> String {
    if columns.is_empty() {
        return String::new();
    }

    let min_width = PREVIEW_OFFSET + PREVIEW_LABEL.len() + 4;

    let mut builder = Builder::default();
    builder.push_record(columns);
    for row in rows {
        builder.push_record(row);
    }

    let mut table = builder.build();
    table.with(Style::rounded());
    table.with(MinWidth::new(min_width));
    table.with(LineText::new(PREVIEW_LABEL, Rows::first()).offset(PREVIEW_OFFSET));
    // LineText re-estimates dimensions, so re-apply MinWidth afterwards.
    table.with(MinWidth::new(min_width));
    table.to_string()
}

/// First `max_rows` rows with geometry rendered as WKT; the index is the
/// leading column.
pub fn render_head(gdf: &GeoDataFrame, max_rows: usize) -> CliResult<String> {
    let frame = gdf.to_wkt().context(RenderSnafu)?;
    let index = frame.index();
    let mut columns = vec![String::new()];
    columns.extend(frame.column_names().into_iter().map(str::to_string));

    let rows: Vec<Vec<String>> = (0..frame.nrows().min(max_rows))
        .map(|i| {
            let key = index
                .key(i)
                .map(|k| k.iter().map(|l| l.to_string()).collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            let mut row = vec![key];
            row.extend(frame.columns().iter().map(|c| c.data.value(i).to_string()));
            row
        })
        .collect();
    Ok(render_table(&columns, &rows))
}

/// Summary lines for `info`.
pub fn describe(gdf: &GeoDataFrame) -> Vec<String> {
    let mut lines = vec![format!("rows: {}", gdf.nrows())];
    lines.push(format!(
        "active_geometry: {}",
        gdf.active_geometry_name().unwrap_or("None")
    ));
    let crs = gdf
        .crs()
        .ok()
        .flatten()
        .map_or_else(|| "None".to_string(), |c| c.to_string());
    lines.push(format!("crs: {crs}"));
    if let Some([minx, miny, maxx, maxy]) = gdf.geometry().ok().and_then(|g| g.total_bounds()) {
        lines.push(format!("total_bounds: [{minx}, {miny}, {maxx}, {maxy}]"));
    }
    lines.push("columns:".to_string());
    for (name, dtype) in gdf.frame().dtypes() {
        lines.push(format!("  {name}: {dtype}"));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_table_aligns_columns() {
        let columns = vec!["col1".to_string(), "longer".to_string()];
        let rows = vec![
            vec!["a".to_string(), "value".to_string()],
            vec!["bb".to_string(), "x".to_string()],
        ];

        let rendered = render_table(&columns, &rows);
        assert!(rendered.contains("Preview output"));
        assert!(rendered.contains("longer"));
        assert!(rendered.contains("bb"));
    }

    #[test]
    fn render_table_empty_columns() {
        assert!(render_table(&[], &[]).is_empty());
    }
}
