use stock_ledger::{
    LedgerError, MemoryStore, Operation, RangeRef, RowStore, StockLedger, WriteMode,
};
use std::sync::atomic::{AtomicUsize, Ordering};

const RANGE: &str = "StockFijo!A:E";

fn strings(row: &[&str]) -> Vec<String> {
    row.iter().map(|c| c.to_string()).collect()
}

fn seeded_store() -> MemoryStore {
    MemoryStore::new().with_sheet(
        "StockFijo",
        vec![
            vec!["Sitio", "Parte", "Descripcion", "Stock", "Optimo", "Notas"],
            vec!["JUJUY", "1750349661", "Filtro", "50", "80", "revisar"],
            vec!["SALTA", "2200", "Correa", "7", "", ""],
        ],
    )
}

fn service(store: &MemoryStore, mode: WriteMode) -> StockLedger<&MemoryStore> {
    StockLedger::new(store, RangeRef::parse(RANGE).unwrap()).with_write_mode(mode)
}

// Counts calls so tests can tell whether the store was contacted at all.
struct CountingStore {
    inner: MemoryStore,
    fetches: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingStore {
    fn new(inner: MemoryStore) -> Self {
        CountingStore {
            inner,
            fetches: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }
}

impl RowStore for CountingStore {
    fn fetch_range(&self, range: &RangeRef) -> stock_ledger::Result<Vec<Vec<String>>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_range(range)
    }

    fn write_range(&self, range: &RangeRef, rows: &[Vec<String>]) -> stock_ledger::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write_range(range, rows)
    }
}

#[test]
fn cell_mode_touches_only_the_stock_cell() {
    println!("\n====== Testing cell write mode ======");
    let store = seeded_store();
    let ledger = service(&store, WriteMode::Cell);

    let outcome = ledger
        .apply_delta("JUJUY", "1750349661", 10, Operation::Increase)
        .unwrap();
    assert_eq!(outcome.new_value, 60);

    let sheet = store.sheet("StockFijo");
    assert_eq!(sheet[0][2], "Descripcion");
    assert_eq!(sheet[1], strings(&["JUJUY", "1750349661", "Filtro", "60", "80", "revisar"]));
    assert_eq!(sheet[2], strings(&["SALTA", "2200", "Correa", "7", "", ""]));
    println!("✓ Only D2 changed, headers and notes left as typed");

    let refreshed = ledger.read_ledger().unwrap();
    assert_eq!(refreshed.get("JUJUY", "1750349661").unwrap().physical_stock, 60);
}

#[test]
fn cell_mode_appends_one_row_in_store_order() {
    let store = seeded_store();
    let ledger = service(&store, WriteMode::Cell);

    let outcome = ledger
        .apply_delta("SALTA", "999", 3, Operation::Increase)
        .unwrap();
    assert!(outcome.created);

    let sheet = store.sheet("StockFijo");
    assert_eq!(sheet.len(), 4);
    assert_eq!(sheet[3], strings(&["SALTA", "999", "", "3"]));
    println!("✓ New row written at row 4, optimal stock left blank");

    let refreshed = ledger.read_ledger().unwrap();
    let row = refreshed.get("SALTA", "999").unwrap();
    assert_eq!((row.physical_stock, row.optimal_stock), (3, 0));
}

#[test]
fn range_mode_writes_back_the_sheet_as_read() {
    println!("\n====== Testing range write mode ======");
    let store = seeded_store();
    let ledger = service(&store, WriteMode::Range);

    ledger
        .apply_delta("SALTA", "2200", 10, Operation::Decrease)
        .unwrap();

    let sheet = store.sheet("StockFijo");
    assert_eq!(
        sheet[0],
        strings(&["Sitio", "Parte", "Descripcion", "Stock", "Optimo", "Notas"])
    );
    assert_eq!(sheet[1], strings(&["JUJUY", "1750349661", "Filtro", "50", "80", "revisar"]));
    assert_eq!(sheet[2], strings(&["SALTA", "2200", "Correa", "0", "", ""]));
    println!("✓ Headers kept as typed, only D3 changed");
}

#[test]
fn range_mode_leaves_unknown_columns_and_raw_values_alone() {
    println!("\n====== Testing range mode with an interleaved column ======");
    let store = MemoryStore::new().with_sheet(
        "StockFijo",
        vec![
            vec!["Sitio", "Parte", "Notas", "Stock", "Optimo"],
            vec!["JUJUY", "A", "revisar", "3.7", "12.5"],
            vec!["SALTA", "B", "ok", "7", "n/d"],
        ],
    );
    let ledger = service(&store, WriteMode::Range);

    let outcome = ledger
        .apply_delta("SALTA", "B", 1, Operation::Increase)
        .unwrap();
    assert_eq!(outcome.new_value, 8);
    assert_eq!(
        store.sheet("StockFijo"),
        vec![
            strings(&["Sitio", "Parte", "Notas", "Stock", "Optimo"]),
            strings(&["JUJUY", "A", "revisar", "3.7", "12.5"]),
            strings(&["SALTA", "B", "ok", "8", "n/d"]),
        ]
    );
    println!("✓ Notes, decimal stock and optimal text untouched");

    ledger
        .apply_delta("SALTA", "C", 2, Operation::Increase)
        .unwrap();
    let sheet = store.sheet("StockFijo");
    assert_eq!(sheet.len(), 4);
    assert_eq!(sheet[3], strings(&["SALTA", "C", "", "2"]));
    assert_eq!(sheet[1], strings(&["JUJUY", "A", "revisar", "3.7", "12.5"]));
    println!("✓ Appended row follows the sheet's own column order");
}

#[test]
fn appends_past_a_bounded_range_are_rejected() {
    println!("\n====== Testing appends on a full bounded range ======");
    for mode in [WriteMode::Cell, WriteMode::Range] {
        let store = MemoryStore::new().with_sheet(
            "StockFijo",
            vec![vec!["Sitio", "Parte", "Stock"], vec!["JUJUY", "A", "1"]],
        );
        let ledger = StockLedger::new(&store, RangeRef::parse("StockFijo!A1:C2").unwrap())
            .with_write_mode(mode);

        let err = ledger
            .apply_delta("SALTA", "B", 5, Operation::Increase)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Io { operation: "write_range", .. }));
        assert_eq!(store.sheet("StockFijo").len(), 2);

        // Rows inside the range still update
        ledger
            .apply_delta("JUJUY", "A", 2, Operation::Increase)
            .unwrap();
        assert_eq!(ledger.read_ledger().unwrap().get("JUJUY", "A").unwrap().physical_stock, 3);
        println!("✓ {mode} mode: {err}");
    }
}

#[test]
fn empty_sheet_gets_header_and_first_row() {
    println!("\n====== Testing empty sheet ======");
    let store = MemoryStore::new();
    let ledger = service(&store, WriteMode::Cell);

    let err = ledger
        .apply_delta("JUJUY", "A", 1, Operation::Decrease)
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
    assert!(store.sheet("StockFijo").is_empty());
    println!("✓ Decrease on an empty sheet writes nothing");

    ledger
        .apply_delta("JUJUY", "A", 5, Operation::Increase)
        .unwrap();
    assert_eq!(
        store.sheet("StockFijo"),
        vec![
            strings(&["Sitio", "Parte", "Descripción", "Stock Físico", "Stock Óptimo"]),
            strings(&["JUJUY", "A", "", "5", "0"]),
        ]
    );
    println!("✓ Header and first row written together");
}

#[test]
fn not_found_leaves_the_store_unchanged() {
    let store = CountingStore::new(seeded_store());
    let ledger = StockLedger::new(&store, RangeRef::parse(RANGE).unwrap());
    let before = store.inner.sheet("StockFijo");

    let err = ledger
        .apply_delta("SALTA", "999", 2, Operation::Decrease)
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::NotFound {
            site: "SALTA".to_string(),
            part: "999".to_string()
        }
    );
    assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    assert_eq!(store.inner.sheet("StockFijo"), before);
    println!("✓ {err}");
}

#[test]
fn validation_happens_before_any_store_call() {
    let store = CountingStore::new(seeded_store());
    let ledger = StockLedger::new(&store, RangeRef::parse(RANGE).unwrap());

    let err = ledger
        .apply_delta("JUJUY", "1750349661", 0, Operation::Increase)
        .unwrap_err();
    assert_eq!(err.kind(), "validation");
    assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
    assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    println!("✓ Zero quantity rejected without a fetch");
}

#[test]
fn offline_store_surfaces_io_errors() {
    let store = seeded_store();
    let ledger = service(&store, WriteMode::Cell);
    store.set_offline(true);

    let err = ledger.read_ledger().unwrap_err();
    assert!(matches!(err, LedgerError::Io { operation: "fetch_range", .. }));
    let err = ledger
        .apply_delta("JUJUY", "1750349661", 1, Operation::Increase)
        .unwrap_err();
    assert_eq!(err.kind(), "io");

    store.set_offline(false);
    let refreshed = ledger.read_ledger().unwrap();
    assert_eq!(refreshed.get("JUJUY", "1750349661").unwrap().physical_stock, 50);
    println!("✓ Failed calls change nothing, retry works once back online");
}

#[test]
fn schema_errors_block_updates() {
    let store = MemoryStore::new().with_sheet(
        "StockFijo",
        vec![vec!["Sitio", "Descripcion"], vec!["JUJUY", "Filtro"]],
    );
    let ledger = service(&store, WriteMode::Cell);

    let err = ledger
        .apply_delta("JUJUY", "A", 1, Operation::Increase)
        .unwrap_err();
    assert_eq!(err.kind(), "schema");
    assert_eq!(store.sheet("StockFijo").len(), 2);
    println!("✓ {err}");
}

#[test]
fn write_modes_parse() {
    assert_eq!("cell".parse::<WriteMode>().unwrap(), WriteMode::Cell);
    assert_eq!("Sheet".parse::<WriteMode>().unwrap(), WriteMode::Range);
    assert!("row".parse::<WriteMode>().is_err());
    assert_eq!(WriteMode::default(), WriteMode::Cell);
}
