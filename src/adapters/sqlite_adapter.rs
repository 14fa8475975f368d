//! SQLite store for daily prices and labels.

use crate::domain::error::LabelTraderError;
use crate::domain::label::{LabelDefinition, LabelMember, LabelSummary, RankingRule};
use crate::domain::price::PriceBar;
use crate::ports::config_port::ConfigPort;
use crate::ports::label_port::LabelPort;
use crate::ports::price_port::PricePort;
use chrono::{NaiveDate, NaiveDateTime};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params, params_from_iter};
use std::collections::BTreeSet;
use tracing::debug;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const SYMBOL_CHUNK: usize = 500;

const PRICE_COLUMNS: &str = "symbol, date, open, high, low, close, volume, adjusted_close";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn db_err(e: r2d2::Error) -> LabelTraderError {
    LabelTraderError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> LabelTraderError {
    LabelTraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, LabelTraderError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| LabelTraderError::Database {
        reason: format!("bad date {s:?} in store: {e}"),
    })
}

type RawBar = (String, String, f64, f64, f64, f64, i64, f64);

fn raw_bar(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawBar> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn into_bar(raw: RawBar) -> Result<PriceBar, LabelTraderError> {
    let (symbol, date, open, high, low, close, volume, adjusted_close) = raw;
    Ok(PriceBar {
        date: parse_date(&date)?,
        symbol,
        open,
        high,
        low,
        close,
        volume,
        adjusted_close,
    })
}

type RawDefinition = (String, String, String, String, String);

fn into_definition(raw: RawDefinition) -> Result<LabelDefinition, LabelTraderError> {
    let (name, rule, start, end, created_at) = raw;
    let created_at = NaiveDateTime::parse_from_str(&created_at, DATETIME_FORMAT).map_err(|e| {
        LabelTraderError::Database {
            reason: format!("bad created_at {created_at:?} in store: {e}"),
        }
    })?;
    Ok(LabelDefinition {
        name,
        rule: rule.parse::<RankingRule>()?,
        start_date: parse_date(&start)?,
        end_date: parse_date(&end)?,
        created_at,
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, LabelTraderError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| LabelTraderError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(db_err)?;

        Ok(Self { pool })
    }

    /// A private in-memory database. The pool holds a single connection so
    /// every caller sees the same data.
    pub fn in_memory() -> Result<Self, LabelTraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(db_err)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, LabelTraderError> {
        self.pool.get().map_err(db_err)
    }

    pub fn initialize_schema(&self) -> Result<(), LabelTraderError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS prices_daily (
                    symbol TEXT NOT NULL,
                    date TEXT NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume INTEGER NOT NULL,
                    adjusted_close REAL NOT NULL,
                    PRIMARY KEY (symbol, date)
                );
                CREATE INDEX IF NOT EXISTS idx_prices_daily_date ON prices_daily(date);
                CREATE TABLE IF NOT EXISTS labels (
                    name TEXT PRIMARY KEY,
                    rule TEXT NOT NULL,
                    start_date TEXT NOT NULL,
                    end_date TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS label_members (
                    label_name TEXT NOT NULL,
                    symbol TEXT NOT NULL,
                    rank INTEGER NOT NULL,
                    score REAL NOT NULL,
                    metadata TEXT NOT NULL,
                    PRIMARY KEY (label_name, symbol)
                );
                CREATE INDEX IF NOT EXISTS idx_label_members_rank ON label_members(label_name, rank);",
            )
            .map_err(query_err)
    }

    /// Upserts bars on (symbol, date). Returns the number of rows written.
    pub fn insert_bars(&self, bars: &[PriceBar]) -> Result<usize, LabelTraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO prices_daily
                     (symbol, date, open, high, low, close, volume, adjusted_close)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .map_err(query_err)?;
            for bar in bars {
                stmt.execute(params![
                    bar.symbol,
                    bar.date.format(DATE_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume,
                    bar.adjusted_close
                ])
                .map_err(query_err)?;
            }
        }
        tx.commit().map_err(query_err)?;
        debug!(rows = bars.len(), "price bars upserted");
        Ok(bars.len())
    }

    fn query_bars(
        &self,
        sql: &str,
        args: Vec<String>,
    ) -> Result<Vec<PriceBar>, LabelTraderError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(query_err)?;
        let rows = stmt
            .query_map(params_from_iter(args), raw_bar)
            .map_err(query_err)?;

        let mut bars = Vec::new();
        for row in rows {
            bars.push(into_bar(row.map_err(query_err)?)?);
        }
        Ok(bars)
    }
}

impl PricePort for SqliteAdapter {
    fn fetch_prices(
        &self,
        symbols: &BTreeSet<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, LabelTraderError> {
        let start = start_date.format(DATE_FORMAT).to_string();
        let end = end_date.format(DATE_FORMAT).to_string();
        let symbols: Vec<&String> = symbols.iter().collect();

        let mut bars = Vec::new();
        for chunk in symbols.chunks(SYMBOL_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT {PRICE_COLUMNS} FROM prices_daily
                 WHERE date >= ? AND date <= ? AND symbol IN ({placeholders})"
            );
            let mut args = vec![start.clone(), end.clone()];
            args.extend(chunk.iter().map(|s| s.to_string()));
            bars.extend(self.query_bars(&sql, args)?);
        }

        bars.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.symbol.cmp(&b.symbol)));
        Ok(bars)
    }

    fn fetch_symbol(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, LabelTraderError> {
        let sql = format!(
            "SELECT {PRICE_COLUMNS} FROM prices_daily
             WHERE symbol = ? AND date >= ? AND date <= ?
             ORDER BY date ASC"
        );
        self.query_bars(
            &sql,
            vec![
                symbol.to_string(),
                start_date.format(DATE_FORMAT).to_string(),
                end_date.format(DATE_FORMAT).to_string(),
            ],
        )
    }

    fn list_symbols(&self) -> Result<Vec<String>, LabelTraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol FROM prices_daily ORDER BY symbol")
            .map_err(query_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(query_err)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, LabelTraderError> {
        let conn = self.conn()?;
        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM prices_daily WHERE symbol = ?1",
                params![symbol],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_err)?;

        match result {
            (Some(min), Some(max), count) if count > 0 => {
                Ok(Some((parse_date(&min)?, parse_date(&max)?, count as usize)))
            }
            _ => Ok(None),
        }
    }
}

impl LabelPort for SqliteAdapter {
    fn replace_label(
        &self,
        definition: &LabelDefinition,
        members: &[LabelMember],
    ) -> Result<(), LabelTraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        tx.execute(
            "DELETE FROM label_members WHERE label_name = ?1",
            params![definition.name],
        )
        .map_err(query_err)?;
        tx.execute("DELETE FROM labels WHERE name = ?1", params![definition.name])
            .map_err(query_err)?;
        tx.execute(
            "INSERT INTO labels (name, rule, start_date, end_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                definition.name,
                definition.rule.name(),
                definition.start_date.format(DATE_FORMAT).to_string(),
                definition.end_date.format(DATE_FORMAT).to_string(),
                definition.created_at.format(DATETIME_FORMAT).to_string()
            ],
        )
        .map_err(query_err)?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO label_members (label_name, symbol, rank, score, metadata)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(query_err)?;
            for member in members {
                stmt.execute(params![
                    definition.name,
                    member.symbol,
                    member.rank,
                    member.score,
                    serde_json::to_string(&member.metadata)?
                ])
                .map_err(query_err)?;
            }
        }

        tx.commit().map_err(query_err)?;
        debug!(label = %definition.name, members = members.len(), "label replaced");
        Ok(())
    }

    fn get_label(&self, name: &str) -> Result<Option<LabelDefinition>, LabelTraderError> {
        let conn = self.conn()?;
        let raw: Option<RawDefinition> = conn
            .query_row(
                "SELECT name, rule, start_date, end_date, created_at FROM labels WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()
            .map_err(query_err)?;
        raw.map(into_definition).transpose()
    }

    fn get_label_members(&self, name: &str) -> Result<Vec<LabelMember>, LabelTraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, rank, score, metadata FROM label_members
                 WHERE label_name = ?1 ORDER BY rank ASC",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![name], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(query_err)?;

        let mut members = Vec::new();
        for row in rows {
            let (symbol, rank, score, metadata) = row.map_err(query_err)?;
            members.push(LabelMember {
                label_name: name.to_string(),
                symbol,
                rank,
                score,
                metadata: serde_json::from_str(&metadata)?,
            });
        }
        Ok(members)
    }

    fn list_labels(&self) -> Result<Vec<LabelSummary>, LabelTraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT l.name, l.rule, l.start_date, l.end_date, l.created_at,
                        (SELECT COUNT(*) FROM label_members m WHERE m.label_name = l.name)
                 FROM labels l
                 ORDER BY l.created_at DESC, l.name ASC",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map([], |row| -> rusqlite::Result<(RawDefinition, i64)> {
                Ok((
                    (row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?),
                    row.get(5)?,
                ))
            })
            .map_err(query_err)?;

        let mut labels = Vec::new();
        for row in rows {
            let (raw, count) = row.map_err(query_err)?;
            labels.push(LabelSummary {
                definition: into_definition(raw)?,
                member_count: count as usize,
            });
        }
        Ok(labels)
    }

    fn delete_label(&self, name: &str) -> Result<bool, LabelTraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        let members = tx
            .execute("DELETE FROM label_members WHERE label_name = ?1", params![name])
            .map_err(query_err)?;
        let definitions = tx
            .execute("DELETE FROM labels WHERE name = ?1", params![name])
            .map_err(query_err)?;
        tx.commit().map_err(query_err)?;
        Ok(members + definitions > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn bar(symbol: &str, date: NaiveDate, close: f64) -> PriceBar {
        PriceBar {
            date,
            symbol: symbol.to_string(),
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000,
            adjusted_close: close,
        }
    }

    fn adapter() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    fn definition(name: &str, minute: u32) -> LabelDefinition {
        LabelDefinition {
            name: name.to_string(),
            rule: RankingRule::Gainers,
            start_date: d(2024, 1, 1),
            end_date: d(2024, 1, 31),
            created_at: d(2024, 2, 1).and_hms_opt(9, minute, 0).unwrap(),
        }
    }

    fn member(label: &str, symbol: &str, rank: u32, score: f64) -> LabelMember {
        LabelMember {
            label_name: label.to_string(),
            symbol: symbol.to_string(),
            rank,
            score,
            metadata: json!({"start_price": 10.0, "end_price": 12.0}),
        }
    }

    #[test]
    fn from_config_missing_path() {
        match SqliteAdapter::from_config(&EmptyConfig) {
            Err(LabelTraderError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn schema_is_idempotent() {
        let adapter = adapter();
        adapter.initialize_schema().unwrap();
    }

    #[test]
    fn fetch_prices_orders_by_date_then_symbol() {
        let adapter = adapter();
        adapter
            .insert_bars(&[
                bar("BBB", d(2024, 1, 2), 20.0),
                bar("AAA", d(2024, 1, 2), 10.0),
                bar("AAA", d(2024, 1, 1), 9.0),
                bar("CCC", d(2024, 1, 1), 5.0),
            ])
            .unwrap();

        let symbols: BTreeSet<String> = ["AAA", "BBB"].iter().map(|s| s.to_string()).collect();
        let bars = adapter
            .fetch_prices(&symbols, d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();
        let keys: Vec<(NaiveDate, &str)> =
            bars.iter().map(|b| (b.date, b.symbol.as_str())).collect();
        assert_eq!(
            keys,
            vec![
                (d(2024, 1, 1), "AAA"),
                (d(2024, 1, 2), "AAA"),
                (d(2024, 1, 2), "BBB")
            ]
        );
    }

    #[test]
    fn fetch_prices_without_data_is_empty() {
        let adapter = adapter();
        let symbols: BTreeSet<String> = ["ZZZ".to_string()].into_iter().collect();
        assert!(
            adapter
                .fetch_prices(&symbols, d(2024, 1, 1), d(2024, 1, 31))
                .unwrap()
                .is_empty()
        );
        assert!(
            adapter
                .fetch_prices(&BTreeSet::new(), d(2024, 1, 1), d(2024, 1, 31))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn insert_upserts_on_symbol_and_date() {
        let adapter = adapter();
        adapter.insert_bars(&[bar("AAA", d(2024, 1, 1), 9.0)]).unwrap();
        adapter.insert_bars(&[bar("AAA", d(2024, 1, 1), 11.0)]).unwrap();
        let bars = adapter.fetch_symbol("AAA", d(2024, 1, 1), d(2024, 1, 1)).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 11.0);
    }

    #[test]
    fn fetch_symbol_respects_window() {
        let adapter = adapter();
        adapter
            .insert_bars(&[
                bar("AAA", d(2024, 1, 1), 9.0),
                bar("AAA", d(2024, 1, 5), 10.0),
                bar("AAA", d(2024, 2, 1), 11.0),
            ])
            .unwrap();
        let bars = adapter.fetch_symbol("AAA", d(2024, 1, 2), d(2024, 1, 31)).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, d(2024, 1, 5));
    }

    #[test]
    fn list_symbols_and_data_range() {
        let adapter = adapter();
        adapter
            .insert_bars(&[
                bar("CBA", d(2024, 1, 1), 9.0),
                bar("BHP", d(2024, 1, 1), 10.0),
                bar("BHP", d(2024, 1, 5), 10.0),
            ])
            .unwrap();
        assert_eq!(adapter.list_symbols().unwrap(), vec!["BHP", "CBA"]);
        assert_eq!(
            adapter.get_data_range("BHP").unwrap(),
            Some((d(2024, 1, 1), d(2024, 1, 5), 2))
        );
        assert_eq!(adapter.get_data_range("XYZ").unwrap(), None);
    }

    #[test]
    fn replace_label_round_trips_members() {
        let adapter = adapter();
        let def = definition("gainers_2024-01-01_2024-01-31", 0);
        adapter
            .replace_label(
                &def,
                &[member(&def.name, "AAA", 1, 20.0), member(&def.name, "BBB", 2, 5.0)],
            )
            .unwrap();

        assert_eq!(adapter.get_label(&def.name).unwrap(), Some(def.clone()));
        let members = adapter.get_label_members(&def.name).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].symbol, "AAA");
        assert_eq!(members[0].metadata["end_price"], 12.0);
    }

    #[test]
    fn replace_label_drops_previous_members() {
        let adapter = adapter();
        let def = definition("gainers_2024-01-01_2024-01-31", 0);
        adapter
            .replace_label(
                &def,
                &[
                    member(&def.name, "AAA", 1, 20.0),
                    member(&def.name, "BBB", 2, 5.0),
                    member(&def.name, "CCC", 3, 1.0),
                ],
            )
            .unwrap();
        adapter
            .replace_label(&def, &[member(&def.name, "CCC", 1, 30.0)])
            .unwrap();

        let members = adapter.get_label_members(&def.name).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].symbol, "CCC");
        assert_eq!(members[0].rank, 1);
    }

    #[test]
    fn list_labels_newest_first_with_counts() {
        let adapter = adapter();
        let older = definition("losers_a", 0);
        let newer = definition("gainers_b", 30);
        adapter.replace_label(&older, &[member("losers_a", "AAA", 1, -5.0)]).unwrap();
        adapter.replace_label(&newer, &[]).unwrap();

        let labels = adapter.list_labels().unwrap();
        let names: Vec<&str> = labels.iter().map(|l| l.definition.name.as_str()).collect();
        assert_eq!(names, vec!["gainers_b", "losers_a"]);
        assert_eq!(labels[0].member_count, 0);
        assert_eq!(labels[1].member_count, 1);
    }

    #[test]
    fn delete_label_removes_members() {
        let adapter = adapter();
        let def = definition("gainers_x", 0);
        adapter.replace_label(&def, &[member("gainers_x", "AAA", 1, 1.0)]).unwrap();

        assert!(adapter.delete_label("gainers_x").unwrap());
        assert!(adapter.get_label("gainers_x").unwrap().is_none());
        assert!(adapter.get_label_members("gainers_x").unwrap().is_empty());
        assert!(!adapter.delete_label("gainers_x").unwrap());
    }
}
