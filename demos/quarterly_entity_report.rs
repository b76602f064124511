use entity_period_builder::{
    verify_report, ConsolidationProcessor, Diagnostic, FiscalQuarter, Quarter, RawCell,
    RawConsolidatedCell, ReportConfig,
};

fn cell(account: &str, entity: &str, quarter: u8, amount: &str) -> RawCell {
    RawCell {
        account_label: account.to_string(),
        entity_label: entity.to_string(),
        fiscal_year: 2025,
        quarter,
        amount_text: amount.to_string(),
    }
}

fn total(account: &str, quarter: u8, amount: &str) -> RawConsolidatedCell {
    RawConsolidatedCell {
        account_label: account.to_string(),
        fiscal_year: 2025,
        quarter,
        amount_text: amount.to_string(),
    }
}

fn main() {
    let config = ReportConfig::from_json_str(
        r#"{
            "organization_name": "F&F",
            "entities": [
                { "key": "OC(국내)", "aliases": ["F&F"] },
                { "key": "중국", "aliases": ["F&F Shanghai"] },
                { "key": "홍콩", "aliases": ["F&F HK"] },
                { "key": "ST미국", "aliases": ["STIP", "STO"] }
            ],
            "accounts": [
                { "key": "매출액", "aliases": ["Ⅰ.매출액"] },
                { "key": "현금및현금성자산", "behavior": "Stock" }
            ],
            "other_entity": "기타",
            "scale": { "unit_label": "백만원", "divisor": 1000000 },
            "export": { "consolidated_key": "연결" }
        }"#,
    )
    .expect("demo configuration should be valid");

    let cells = vec![
        cell("Ⅰ. 매출액", "F&F", 1, "300,000,000,000"),
        cell("Ⅰ. 매출액", "F&F Shanghai", 1, "120,000,000,000"),
        cell("Ⅰ. 매출액", "F&F HK", 1, "10,000,000,000"),
        cell("Ⅰ. 매출액", "STIP", 1, "4,000,000,000"),
        cell("Ⅰ. 매출액", "STO", 1, "1,000,000,000"),
        cell("Ⅰ. 매출액", "F&F", 2, "620,000,000,000"),
        cell("Ⅰ. 매출액", "F&F Shanghai", 2, "250,000,000,000"),
        cell("Ⅰ. 매출액", "F&F HK", 2, "21,000,000,000"),
        cell("Ⅰ. 매출액", "STIP", 2, "9,000,000,000"),
        cell("Ⅰ. 매출액", "STO", 2, "(500,000,000)"),
        cell("Ⅰ. 매출액", "F&F", 3, "910,000,000,000"),
        cell("Ⅰ. 매출액", "F&F Shanghai", 3, "360,000,000,000"),
        cell("현금및현금성자산", "F&F", 1, "150,000,000,000"),
        cell("현금및현금성자산", "F&F Shanghai", 1, "40,000,000,000"),
        cell("현금및현금성자산", "F&F", 2, "170,500,000,000"),
        cell("현금및현금성자산", "F&F Shanghai", 2, "38,000,000,000"),
    ];
    let totals = vec![
        total("Ⅰ.매출액", 1, "420,500,000,000"),
        total("Ⅰ.매출액", 2, "880,250,000,000"),
        total("현금및현금성자산", 1, "205,000,000,000"),
        total("현금및현금성자산", 2, "219,000,000,000"),
        total("현금및현금성자산", 3, "230,000,000,000"),
    ];

    let report = ConsolidationProcessor::process_raw(&config, &cells, &totals)
        .expect("report should build");

    println!("Quarterly entity report: {}", report.organization_name);
    println!("Known entities: {}", report.entities.join(", "));

    for (account, account_report) in &report.accounts {
        println!("\n{} ({:?})", account, account_report.behavior);
        for (period, cell) in &account_report.periods {
            let other = match (cell.other.discrete, cell.other.cumulative) {
                (Some(discrete), Some(cumulative)) => format!("{} / {}", discrete, cumulative),
                (None, Some(cumulative)) => format!("? / {}", cumulative),
                _ => "unreconciled".to_string(),
            };
            println!(
                " - {} (ends {}): consolidated {:?}, {} {}",
                period,
                cell.period_end,
                cell.consolidated,
                report.other_entity,
                other
            );
        }
    }

    if !report.diagnostics.is_empty() {
        println!("\nDiagnostics:");
        for diagnostic in &report.diagnostics {
            let marker = match diagnostic {
                Diagnostic::MissingReferenceData { .. } => "!",
                _ => "-",
            };
            println!(" {} {}", marker, diagnostic);
        }
    }

    match verify_report(&report) {
        Ok(()) => println!("\nReconciliation and additivity verified."),
        Err(e) => println!("\nVerification failed: {}", e),
    }

    let export = report
        .to_dashboard(&config.scale, &config.export)
        .expect("values should fit the export range");

    let q2 = FiscalQuarter::new(2025, Quarter::Q2);
    println!(
        "\n{} Q2 in {}: OC(국내) {:?}, 기타 {:?}, 연결 {:?}",
        "매출액",
        export.scale.unit_label,
        export.value("매출액", &q2.discrete_key(), "OC(국내)"),
        export.value("매출액", &q2.discrete_key(), "기타"),
        export.value("매출액", &q2.cumulative_key(), "연결"),
    );

    println!(
        "\nDashboard JSON:\n{}",
        export.data_to_json().expect("export should serialize")
    );
}
