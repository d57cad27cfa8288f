use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use calamine::{Data, Reader, open_workbook_auto};
use pretty_assertions::assert_eq;
use rowkit_io_xlsx::{
    CellExport, EnumFieldValue, EnumOmitStrategy, ExportError, ExportRecord, RecordExporter,
    SpecExportOptions, SpecFieldSchema,
};
use rust_decimal::Decimal;
use serde_json::json;

struct DemoFlag(bool);

impl CellExport for DemoFlag {
    fn to_cell_string(&self) -> String {
        if self.0 { "测试帐号" } else { "正式帐号" }.to_string()
    }
}

struct Player {
    name: String,
    balance: Decimal,
    created_at: i64,
    kind: DemoFlag,
    is_vip: bool,
    password_hash: String,
}

impl ExportRecord for Player {
    fn schema() -> Vec<SpecFieldSchema> {
        vec![
            SpecFieldSchema::new("Name", "title=姓名;freeze"),
            SpecFieldSchema::new("Balance", r##"title=余额;format="#,##0.00""##),
            SpecFieldSchema::new("CreatedAt", "timestamp,title=Created"),
            SpecFieldSchema::new("Kind", "title=类型"),
            SpecFieldSchema::new("IsVip", r#"title=VIP;valuemap={"true":"是","false":"否"}"#),
            SpecFieldSchema::new("PasswordHash", "omit"),
        ]
    }

    fn field_values(&self) -> Vec<EnumFieldValue<'_>> {
        vec![
            (&self.name).into(),
            self.balance.into(),
            self.created_at.into(),
            EnumFieldValue::Custom(&self.kind),
            self.is_vip.into(),
            (&self.password_hash).into(),
        ]
    }
}

fn derive_players() -> Vec<Player> {
    vec![
        Player {
            name: "张三".to_string(),
            balance: Decimal::from(1000),
            created_at: 0,
            kind: DemoFlag(true),
            is_vip: true,
            password_hash: "x1".to_string(),
        },
        Player {
            name: "Bob".to_string(),
            balance: Decimal::from_str("-5.1").expect("decimal"),
            created_at: 86_400,
            kind: DemoFlag(false),
            is_vip: false,
            password_hash: "x2".to_string(),
        },
    ]
}

fn read_back(v_bytes: &[u8], dir: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let path_file = dir.join("export.xlsx");
    std::fs::write(&path_file, v_bytes).expect("write workbook");

    let mut workbook = open_workbook_auto(&path_file).expect("open workbook");
    let l_sheet_names = workbook.sheet_names().to_vec();
    let range = workbook
        .worksheet_range(&l_sheet_names[0])
        .expect("read sheet");
    let grid = range
        .rows()
        .map(|row| row.iter().map(Data::to_string).collect())
        .collect();
    (l_sheet_names, grid)
}

#[test]
fn test_typed_records_round_trip_through_xlsx() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut exporter = RecordExporter::new(&SpecExportOptions {
        timezone: Some("Asia/Shanghai".to_string()),
        sheet_name: "玩家".to_string(),
        if_autofilter: true,
        if_freeze_header: true,
        ..Default::default()
    });

    let v_bytes = exporter.export(&derive_players()).expect("export");
    let (l_sheet_names, grid) = read_back(&v_bytes, dir.path());

    assert_eq!(l_sheet_names, vec!["玩家".to_string()]);
    assert_eq!(
        grid,
        vec![
            vec!["姓名", "余额", "Created", "类型", "VIP"],
            vec!["张三", "1000.00", "1970-01-01 08:00:00", "测试帐号", "是"],
            vec!["Bob", "-5.10", "1970-01-02 08:00:00", "正式帐号", "否"],
        ]
    );

    let l_reports = exporter.report();
    assert_eq!(l_reports.len(), 1);
    assert_eq!(l_reports[0].n_rows, 2);
    assert_eq!(l_reports[0].n_columns, 5);
    assert_eq!(l_reports[0].n_columns_omitted, 1);
    assert!(l_reports[0].warnings.is_empty());
}

#[test]
fn test_json_records_with_remove_strategy_match_excise() {
    let data = json!([
        {"Name": "A", "Secret": "s1", "Score": 12.5, "Active": true, "Note": "n"},
        {"Name": "B", "Secret": "s2", "Score": 3, "Active": false, "Note": "m"}
    ]);
    let dict_annotations = BTreeMap::from([
        ("Secret".to_string(), "omit".to_string()),
        ("Note".to_string(), "omit".to_string()),
        ("Score".to_string(), "title=分数".to_string()),
    ]);

    let mut l_grids = Vec::new();
    for rule_omit in [EnumOmitStrategy::Excise, EnumOmitStrategy::Remove] {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut exporter = RecordExporter::new(&SpecExportOptions {
            rule_omit,
            ..Default::default()
        });
        let v_bytes = exporter
            .export_json(&data, dict_annotations.clone())
            .expect("export");
        l_grids.push(read_back(&v_bytes, dir.path()).1);
    }

    assert_eq!(
        l_grids[0],
        vec![
            vec!["Name", "分数", "Active"],
            vec!["A", "12.5", "true"],
            vec!["B", "3", "false"],
        ]
    );
    assert_eq!(l_grids[0], l_grids[1]);
}

#[test]
fn test_invalid_inputs_fail_before_writing() {
    let mut exporter = RecordExporter::default();

    let l_empty: Vec<Player> = vec![];
    assert!(matches!(exporter.export(&l_empty), Err(ExportError::EmptyInput)));

    let data = json!(42);
    assert!(matches!(
        exporter.export_json(&data, BTreeMap::new()),
        Err(ExportError::NotASequence)
    ));

    let data = json!([5, 8, 9]);
    assert!(matches!(
        exporter.export_json(&data, BTreeMap::new()),
        Err(ExportError::ElementNotRecord)
    ));
    assert!(exporter.report().is_empty());
}

struct Secret {
    token: &'static str,
    note: &'static str,
}

impl ExportRecord for Secret {
    fn schema() -> Vec<SpecFieldSchema> {
        vec![
            SpecFieldSchema::new("Token", "omit"),
            SpecFieldSchema::new("Note", "omit;width=30"),
        ]
    }

    fn field_values(&self) -> Vec<EnumFieldValue<'_>> {
        vec![self.token.into(), self.note.into()]
    }
}

#[test]
fn test_every_field_omitted_exports_empty_sheet() {
    let l_records = vec![
        Secret { token: "t1", note: "n1" },
        Secret { token: "t2", note: "n2" },
    ];

    for rule_omit in [EnumOmitStrategy::Excise, EnumOmitStrategy::Remove] {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut exporter = RecordExporter::new(&SpecExportOptions {
            rule_omit,
            if_autofilter: true,
            if_freeze_header: true,
            ..Default::default()
        });
        let v_bytes = exporter.export(&l_records).expect("export");
        let (_, grid) = read_back(&v_bytes, dir.path());
        assert!(grid.iter().flatten().all(String::is_empty), "{rule_omit:?}");

        let l_reports = exporter.report();
        assert_eq!(l_reports[0].n_columns, 0);
        assert_eq!(l_reports[0].n_columns_omitted, 2);
        assert_eq!(l_reports[0].n_rows, 2);
    }
}

struct Price {
    amount: Decimal,
}

impl ExportRecord for Price {
    fn schema() -> Vec<SpecFieldSchema> {
        vec![SpecFieldSchema::new("Amount", "")]
    }

    fn field_values(&self) -> Vec<EnumFieldValue<'_>> {
        vec![self.amount.into()]
    }
}

#[test]
fn test_decimal_digits_above_scale_limit_are_capped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut exporter = RecordExporter::new(&SpecExportOptions {
        decimal_digits: 40,
        ..Default::default()
    });
    let l_records = vec![Price {
        amount: Decimal::from_str("1.5").expect("decimal"),
    }];

    let v_bytes = exporter.export(&l_records).expect("export");
    let (_, grid) = read_back(&v_bytes, dir.path());
    assert_eq!(grid[1][0], format!("1.5{}", "0".repeat(27)));
}

#[test]
fn test_quoted_sheet_name_is_sanitized_and_exports() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut exporter = RecordExporter::new(&SpecExportOptions {
        sheet_name: "'Q1'".to_string(),
        ..Default::default()
    });
    let l_records = vec![Price {
        amount: Decimal::from(7),
    }];

    let v_bytes = exporter.export(&l_records).expect("export");
    let (l_sheet_names, grid) = read_back(&v_bytes, dir.path());
    assert_eq!(l_sheet_names, vec!["Q1".to_string()]);
    assert_eq!(grid, vec![vec!["Amount"], vec!["7.00"]]);
    assert_eq!(exporter.report()[0].warnings.len(), 1);
}
