use crate::*;
use regex::Regex;
use tracing_test::traced_test;

macro_rules! procfs_test {
    ($test_name:ident, $fixture:literal, $parser:expr, |$rows:ident| $check:block) => {
        #[test]
        #[traced_test]
        fn $test_name() {
            let data = include_str!(concat!("../testdata/", $fixture));
            let parser: ParserConfig = $parser;
            let $rows = record::parse(data, &parser).expect(stringify!($test_name));
            $check
        }
    };
}

fn number(row: &Record, field: &str) -> f64 {
    match row.get(field) {
        Some(Value::Number(n)) => *n,
        other => panic!("{} is not a number: {:?}", field, other),
    }
}

fn text<'a>(row: &'a Record, field: &str) -> &'a str {
    match row.get(field) {
        Some(Value::Text(s)) => s,
        other => panic!("{} is not a string: {:?}", field, other),
    }
}

const NET_DEV_COLUMNS: &[&str] = &[
    "interface",
    "recv_bytes",
    "recv_packets",
    "recv_errs",
    "recv_drop",
    "recv_fifo",
    "recv_frame",
    "recv_compressed",
    "recv_multicast",
    "send_bytes",
    "send_packets",
    "send_errs",
    "send_drop",
    "send_fifo",
    "send_colls",
    "send_carrier",
    "send_compressed",
];

const STAT_COLUMNS: &[&str] = &[
    "label",
    "user",
    "nice",
    "system",
    "idle",
    "iowait",
    "irq",
    "softirq",
    "steal",
    "guest",
    "guest_nice",
];

const STAT_PATTERN: &str = r"(cpu\d*)\s+(\d+)\s+(\d+)\s+(\d+)\s+(\d+)\s+(\d+)\s+(\d+)\s+(\d+)\s+(\d+)\s+(\d+)\s+(\d+)";

procfs_test!(
    cpuinfo,
    "cpuinfo",
    ParserConfig::key_value("\n\n", ":"),
    |rows| {
        assert_eq!(rows.len(), 2);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(number(row, "processor"), i as f64);
            assert_eq!(number(row, "cpu MHz"), 2400.05);
            assert_eq!(text(row, "vendor_id"), "GenuineIntel");
            assert_eq!(text(row, "power management"), "");
        }
    }
);

procfs_test!(
    loadavg,
    "loadavg",
    ParserConfig::table(&["1m", "5m", "15m", "running/total", "last_pid"], 0),
    |rows| {
        assert_eq!(rows.len(), 1);
        assert_eq!(number(&rows[0], "1m"), 0.01);
        assert_eq!(number(&rows[0], "5m"), 0.05);
        assert_eq!(number(&rows[0], "15m"), 0.05);
        assert_eq!(text(&rows[0], "running/total"), "1/461");
        assert_eq!(number(&rows[0], "last_pid"), 13282.);
    }
);

procfs_test!(netstat, "net/netstat", ParserConfig::KeyRow {}, |rows| {
    assert_eq!(rows.len(), 2);

    assert_eq!(text(&rows[0], "id"), "TcpExt");
    assert_eq!(number(&rows[0], "EmbryonicRsts"), 3.);

    assert_eq!(text(&rows[1], "id"), "IpExt");
    assert_eq!(number(&rows[1], "InNoRoutes"), 0.);
});

procfs_test!(
    net_dev,
    "net/dev",
    ParserConfig::table(NET_DEV_COLUMNS, 2),
    |rows| {
        assert_eq!(rows.len(), 11);

        assert_eq!(text(&rows[0], "interface"), "veth929074f");
        assert_eq!(text(&rows[9], "interface"), "lo");

        assert_eq!(number(&rows[8], "recv_packets"), 10032.);
    }
);

procfs_test!(
    stat_cpu,
    "stat",
    ParserConfig::regexp(STAT_COLUMNS, Regex::new(STAT_PATTERN).unwrap()),
    |rows| {
        assert_eq!(rows.len(), 3);

        assert_eq!(text(&rows[1], "label"), "cpu0");
        assert_eq!(number(&rows[2], "irq"), 122.);
    }
);

// End to end against the real filesystem, the fixtures copied into a scratch /proc
#[test]
#[traced_test]
fn collect_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let proc = dir.path().join("proc");
    std::fs::create_dir_all(proc.join("net")).unwrap();
    for fixture in ["loadavg", "stat", "net/dev", "net/netstat"] {
        std::fs::copy(
            concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/").to_string() + fixture,
            proc.join(fixture),
        )
        .unwrap();
    }

    let proc = proc.display().to_string();
    let config = serde_json::json!([
        {
            "file": format!("{}/loadavg", proc),
            "metrics": {
                "/proc/loadavg/1m": "{1m}",
                "/proc/loadavg/per_cpu": "{1m},{NUM_CPU},:div"
            },
            "tags": { "host": "test" },
            "parser": {
                "format": "table",
                "columns": ["1m", "5m", "15m", "running/total", "last_pid"]
            }
        },
        {
            "file": format!("{}/net/*", proc),
            "metrics": { "/proc/net/{source:path:-1}/{id}/count": "1" },
            "parser": { "format": "key-row" }
        },
        {
            "file": format!("{}/stat", proc),
            "metrics": { "/proc/cpu/{label}/busy": "{user},{system},:add" },
            "parser": {
                "format": "regexp",
                "columns": STAT_COLUMNS,
                "pattern": STAT_PATTERN
            }
        }
    ]);
    let config_path = dir.path().join("filemetrics.json");
    std::fs::write(&config_path, config.to_string()).unwrap();

    let collector = FileCollector::new();
    let namespaces = collector
        .discover(&config_path)
        .unwrap()
        .iter()
        .map(|ns| ns.to_string())
        .collect::<Vec<_>>();
    assert_eq!(
        namespaces,
        vec![
            "/proc/loadavg/1m",
            "/proc/loadavg/per_cpu",
            "/proc/net/{source:path:-1}/{id}/count",
            "/proc/cpu/{label}/busy",
        ]
    );

    // net/dev fails key-row parsing, net/netstat on its own would succeed, but the whole
    // configuration is dropped
    let metrics = collector.collect(&config_path).unwrap();
    let got = metrics
        .iter()
        .map(|m| m.namespace.to_string())
        .collect::<Vec<_>>();
    assert_eq!(
        got,
        vec![
            "/proc/loadavg/1m",
            "/proc/loadavg/per_cpu",
            "/proc/cpu/cpu/busy",
            "/proc/cpu/cpu0/busy",
            "/proc/cpu/cpu1/busy",
        ]
    );
    assert_eq!(metrics[0].value, Value::Number(0.01));
    assert_eq!(metrics[0].tags.get("host").map(String::as_str), Some("test"));
    assert_eq!(metrics[4].value, Value::Number(1123. + 849.));
    assert!(metrics[2].tags.is_empty());
    assert!(logs_contain("collection failed"));
}

#[test]
fn collect_non_utf8_snapshot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("snapshot.log");
    std::fs::write(&path, b"foo 1\nbar \xff\xfe\n").unwrap();

    let document = serde_json::json!([{
        "file": path.display().to_string(),
        "metrics": { "/log/foo": "{foo}" },
        "parser": { "format": "key-value" }
    }]);
    let configs = config::from_json(&document.to_string()).unwrap();

    let defaults = collector::default_vars();
    let metrics = configs[0]
        .collect(&source::LocalFs, &defaults, &collector::SystemClock)
        .unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].namespace.to_string(), "/log/foo");
    assert_eq!(metrics[0].value, Value::Number(1.));
}
