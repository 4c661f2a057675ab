use chrono::NaiveDate;
use spend_forecast::{ForecastError, TransactionKind, TransactionLoader};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_csv_transactions() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "date,amount,type,category").unwrap();
    writeln!(file, "2024-02-01,2500.0,income,salary").unwrap();
    writeln!(file, "2024-02-01T12:45:00, -18.25 ,expense,food").unwrap();
    writeln!(file, "2024-02-03,-60.0,expense,transport").unwrap();

    let transactions = TransactionLoader::from_csv(file.path()).unwrap();

    assert_eq!(transactions.len(), 3);
    assert_eq!(transactions[0].kind, TransactionKind::Income);
    assert_eq!(transactions[1].date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    assert_eq!(transactions[1].amount, -18.25);
    assert_eq!(transactions[2].category, "transport");
}

#[test]
fn test_load_csv_rejects_unknown_type() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "date,amount,type,category").unwrap();
    writeln!(file, "2024-02-01,10.0,transfer,misc").unwrap();

    let result = TransactionLoader::from_csv(file.path());
    assert!(matches!(result, Err(ForecastError::CsvError(_))));
}

#[test]
fn test_load_json_transactions() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[
            {{"date": "2024-02-01", "amount": -9.5, "type": "expense", "category": "coffee"}},
            {{"date": "2024-02-02T08:00:00Z", "amount": 40.0, "type": "income"}}
        ]"#
    )
    .unwrap();

    let transactions = TransactionLoader::from_json(file.path()).unwrap();

    assert_eq!(transactions.len(), 2);
    assert!(transactions[0].is_expense());
    assert_eq!(transactions[1].category, "uncategorized");
}

#[test]
fn test_missing_file_is_io_error() {
    let result = TransactionLoader::from_csv("/nonexistent/transactions.csv");
    assert!(matches!(result, Err(ForecastError::IoError(_))));
}
