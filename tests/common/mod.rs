use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, XlsxError};
use std::path::Path;

/// Shape of a generated test workbook.
pub struct WorkbookSpec {
    pub resumen_headers: Vec<&'static str>,
    pub with_envios: bool,
    pub with_td: bool,
    pub td_total: Option<f64>,
}

impl Default for WorkbookSpec {
    fn default() -> Self {
        Self {
            // Stray whitespace as typed in the real sheet.
            resumen_headers: vec![
                "num_factura",
                " paciente",
                "responsable ",
                " valor_total ",
                "SEDE",
                "servicio",
                "fecha_fact",
            ],
            with_envios: true,
            with_td: true,
            td_total: Some(500.0),
        }
    }
}

/// (invoice, patient, payer, amount, branch, service, date)
pub const ROWS: [(&str, &str, &str, f64, &str, &str, &str); 3] = [
    ("F-1001", "Ana Ruiz", "SURA", 100.0, "FUNDADORES", "CONSULTA", "2026-01-05"),
    ("F-1002", "Luis Mora", "SANITAS", 50.0, "SUBA", "LABORATORIO", "2026-01-10"),
    ("F-1003", "Marta Gil", "SANITAS", 25.0, "FUNDADORES", "LABORATORIO", "2026-01-20"),
];

/// Row of `ROWS` whose date is stored as a real date cell, not text.
pub const DATE_CELL_ROW: usize = 2;

pub fn write_workbook(path: &Path, spec: &WorkbookSpec) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");

    let resumen = workbook.add_worksheet();
    resumen.set_name("resumen")?;
    for (col, header) in spec.resumen_headers.iter().enumerate() {
        resumen.write_string(0, col as u16, *header)?;
    }
    for (i, (invoice, patient, payer, amount, branch, service, date)) in ROWS.iter().enumerate() {
        let row = i as u32 + 1;
        for (col, header) in spec.resumen_headers.iter().enumerate() {
            let col = col as u16;
            match header.trim() {
                "num_factura" => resumen.write_string(row, col, *invoice)?,
                "paciente" => resumen.write_string(row, col, *patient)?,
                "responsable" => resumen.write_string(row, col, *payer)?,
                "valor_total" => resumen.write_number(row, col, *amount)?,
                "SEDE" => resumen.write_string(row, col, *branch)?,
                "servicio" => resumen.write_string(row, col, *service)?,
                "fecha_fact" if i == DATE_CELL_ROW => {
                    let ymd: Vec<u16> = date.split('-').map(|p| p.parse().unwrap()).collect();
                    let datetime = ExcelDateTime::from_ymd(ymd[0], ymd[1] as u8, ymd[2] as u8)?;
                    resumen.write_datetime_with_format(row, col, &datetime, &date_format)?
                }
                "fecha_fact" => resumen.write_string(row, col, *date)?,
                other => resumen.write_string(row, col, other)?,
            };
        }
    }

    if spec.with_envios {
        let envios = workbook.add_worksheet();
        envios.set_name("envios")?;
        envios.write_string(0, 0, "guia ")?;
        envios.write_string(0, 1, "num_factura")?;
        envios.write_string(1, 0, "G-01")?;
        envios.write_string(1, 1, "F-1001")?;
        envios.write_string(2, 0, "G-02")?;
        envios.write_string(2, 1, "F-1002")?;
    }

    if spec.with_td {
        let td = workbook.add_worksheet();
        td.set_name("TD")?;
        td.write_string(0, 0, "SEDE")?;
        td.write_string(0, 1, " meta")?;
        td.write_string(1, 0, "FUNDADORES")?;
        td.write_number(1, 1, 300.0)?;
        td.write_string(2, 0, "SUBA")?;
        td.write_number(2, 1, 150.0)?;
        if let Some(total) = spec.td_total {
            td.write_string(3, 0, "TOTAL")?;
            td.write_number(3, 1, total)?;
        }
    }

    workbook.save(path)?;
    Ok(())
}
