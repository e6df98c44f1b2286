use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use memo_cache::{
    Cache, CacheError, CacheMode, CachedFunction, CallArgs, Context, DirStore, MemoryStore,
    ReportSink, Signature, Store,
};
use memo_version::{Registry, VersionError};

fn multiply(registry: &Registry, version: &str) -> CachedFunction {
    let versioned = registry.version("app::multiply", version).declare().unwrap();
    CachedFunction::new(versioned, Signature::new(["x", "y"]))
}

fn call_multiply(
    f: &CachedFunction,
    cache: &Cache,
    x: i64,
    y: i64,
    calls: &AtomicUsize,
) -> i64 {
    f.call(Some(cache), CallArgs::new().arg(&x).arg(&y), |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, CacheError>(x * y)
    })
    .unwrap()
}

fn buffered(cache: Cache) -> (Cache, Arc<Mutex<String>>) {
    let (sink, buf) = ReportSink::buffer();
    (cache.with_verbose(Context::all().with_sink(sink)), buf)
}

#[test]
fn round_trip_hits_without_recomputing() {
    let registry = Registry::new();
    let f = multiply(&registry, "1.0");
    let cache = Cache::new(Arc::new(MemoryStore::new()));
    let calls = AtomicUsize::new(0);

    assert_eq!(call_multiply(&f, &cache, 2, 3, &calls), 6);
    assert!(!f.was_cached());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert_eq!(call_multiply(&f, &cache, 2, 3, &calls), 6);
    assert!(f.was_cached());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert_eq!(call_multiply(&f, &cache, 3, 3, &calls), 9);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn positional_and_keyword_calls_share_a_record() {
    let registry = Registry::new();
    let f = multiply(&registry, "1.0");
    let cache = Cache::new(Arc::new(MemoryStore::new()));
    let calls = AtomicUsize::new(0);

    call_multiply(&f, &cache, 2, 3, &calls);
    let positional = f.last_key().unwrap();
    let value: i64 = f
        .call(
            Some(&cache),
            CallArgs::new().kwarg("y", &3i64).kwarg("x", &2i64),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>(0)
            },
        )
        .unwrap();
    assert_eq!(value, 6);
    assert!(f.was_cached());
    assert_eq!(f.last_key().unwrap(), positional);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn excluded_argument_does_not_change_key() {
    let registry = Registry::new();
    let versioned = registry.version("app::train", "1").declare().unwrap();
    let f = CachedFunction::new(versioned, Signature::new(["data", "threads"])).exclude(["threads"]);
    let cache = Cache::new(Arc::new(MemoryStore::new()));
    let calls = AtomicUsize::new(0);
    let run = |data: u32, threads: u32| -> u32 {
        f.call(Some(&cache), CallArgs::new().arg(&data).arg(&threads), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, CacheError>(data * 10)
        })
        .unwrap()
    };

    assert_eq!(run(1, 4), 10);
    assert_eq!(run(1, 16), 10);
    assert!(f.was_cached());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(run(2, 4), 20);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn bumping_version_invalidates_records() {
    let store = Arc::new(MemoryStore::new());
    let cache = Cache::new(store.clone());
    let calls = AtomicUsize::new(0);

    let v1 = multiply(&Registry::new(), "1.0");
    call_multiply(&v1, &cache, 2, 3, &calls);
    let key = v1.last_key().unwrap();
    assert_eq!(store.read_version(&key).as_deref(), Some("1.0"));

    let v2 = multiply(&Registry::new(), "1.1");
    let (cache, report) = buffered(cache);
    assert_eq!(call_multiply(&v2, &cache, 2, 3, &calls), 6);
    assert!(!v2.was_cached());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(v2.last_key().unwrap(), key);
    assert_eq!(store.read_version(&key).as_deref(), Some("1.1"));
    let report = report.lock().unwrap();
    assert!(report.contains("refers to version '1.0' not '1.1'. Deleting"));
}

#[test]
fn dependency_bump_changes_version_id() {
    let old = Registry::new();
    old.version("app::f", "1").declare().unwrap();
    let g_old = old.version("app::g", "1").depends_on("f").declare().unwrap();

    let new = Registry::new();
    new.version("app::f", "2").declare().unwrap();
    let g_new = new.version("app::g", "1").depends_on("f").declare().unwrap();

    let a = CachedFunction::new(g_old, Signature::new(["x"]));
    let b = CachedFunction::new(g_new, Signature::new(["x"]));
    assert_eq!(a.version_id().unwrap(), "1 { app::f: 1 }");
    assert_ne!(a.version_id().unwrap(), b.version_id().unwrap());
    assert_eq!(
        a.versioned().input_version(),
        b.versioned().input_version()
    );
}

#[test]
fn cycle_surfaces_as_error() {
    let registry = Registry::new();
    let a = registry.version("app::a", "1").depends_on("b").declare().unwrap();
    registry.version("app::b", "1").depends_on("a").declare().unwrap();
    let f = CachedFunction::new(a, Signature::new(["x"]));
    let cache = Cache::new(Arc::new(MemoryStore::new()));
    let calls = AtomicUsize::new(0);

    let err = f
        .call(Some(&cache), CallArgs::new().arg(&1), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<i32, CacheError>(1)
        })
        .unwrap_err();
    match err {
        CacheError::Version(VersionError::Cycle { chain, .. }) => {
            assert_eq!(chain, ["app::a", "app::b", "app::a"]);
        }
        other => panic!("expected a cycle, got {other}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

struct ModeCase {
    mode: CacheMode,
    populated: bool,
    computes: bool,
    record_after: Option<i64>,
}

#[test]
fn mode_matrix() {
    use CacheMode::*;
    let cases = [
        (On, true, false, Some(6)),
        (Gen, true, false, Some(6)),
        (Off, true, true, Some(6)),
        (Clear, true, true, None),
        (Update, true, true, Some(7)),
        (ReadOnly, true, false, Some(6)),
        (On, false, true, Some(7)),
        (Gen, false, true, Some(7)),
        (Off, false, true, None),
        (Clear, false, true, None),
        (Update, false, true, Some(7)),
        (ReadOnly, false, true, None),
    ]
    .map(|(mode, populated, computes, record_after)| ModeCase {
        mode,
        populated,
        computes,
        record_after,
    });

    for case in cases {
        let label = format!("{} populated={}", case.mode, case.populated);
        let registry = Registry::new();
        let f = multiply(&registry, "1.0");
        let store = Arc::new(MemoryStore::new());
        let cache = Cache::new(store.clone());
        let calls = AtomicUsize::new(0);
        if case.populated {
            call_multiply(&f, &cache, 2, 3, &calls);
        }
        calls.store(0, Ordering::SeqCst);

        let value: i64 = f
            .call(
                Some(&cache.with_mode(case.mode)),
                CallArgs::new().arg(&2i64).arg(&3i64),
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, CacheError>(7)
                },
            )
            .unwrap();
        let computed = calls.load(Ordering::SeqCst) == 1;
        assert_eq!(computed, case.computes, "{label}");
        assert_eq!(value, if computed { 7 } else { 6 }, "{label}");
        assert_eq!(f.was_cached(), !computed, "{label}");

        let key = f.last_key().unwrap();
        let after = store.exists(&key).then(|| {
            f.call(
                Some(&cache.with_mode(ReadOnly)),
                CallArgs::new().arg(&2i64).arg(&3i64),
                |_| Ok::<i64, CacheError>(-1),
            )
            .unwrap()
        });
        assert_eq!(after, case.record_after, "{label}");
    }
}

#[test]
fn incompatible_record_kept_unless_mode_deletes() {
    for (mode, version_after) in [
        (CacheMode::ReadOnly, "1.0"),
        (CacheMode::Gen, "2.0"),
        (CacheMode::On, "2.0"),
    ] {
        let store = Arc::new(MemoryStore::new());
        let cache = Cache::new(store.clone());
        let calls = AtomicUsize::new(0);
        let old = multiply(&Registry::new(), "1.0");
        call_multiply(&old, &cache, 2, 3, &calls);
        let key = old.last_key().unwrap();

        let new = multiply(&Registry::new(), "2.0");
        let (cache, report) = buffered(cache.with_mode(mode));
        call_multiply(&new, &cache, 2, 3, &calls);
        assert_eq!(calls.load(Ordering::SeqCst), 2, "{mode}");
        assert_eq!(
            store.read_version(&key).as_deref(),
            Some(version_after),
            "{mode}"
        );
        let expected = if mode.del_incomp() { "Deleting" } else { "Ignoring" };
        assert!(report.lock().unwrap().contains(expected), "{mode}");
    }
}

#[test]
fn qualify_forces_update_for_dependents() {
    let registry = Registry::new();
    registry.version("app::g", "1").declare().unwrap();
    let h_versioned = registry.version("app::h", "1").depends_on("g").declare().unwrap();
    let h = CachedFunction::new(h_versioned, Signature::new(["x"]));
    let store = Arc::new(MemoryStore::new());
    let (cache, report) = buffered(Cache::new(store.clone()));
    let calls = AtomicUsize::new(0);
    let run = |cache: &Cache| -> i32 {
        h.call(Some(cache), CallArgs::new().arg(&5), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, CacheError>(calls.load(Ordering::SeqCst) as i32)
        })
        .unwrap()
    };

    assert_eq!(run(&cache), 1);
    assert_eq!(run(&cache), 1);
    assert!(h.was_cached());

    let unrelated = cache.with_update(["app::other"]);
    assert_eq!(run(&unrelated), 1);
    assert!(h.was_cached());

    let update_g = cache.with_update(["app::g"]);
    assert_eq!(update_g.mode(), CacheMode::On);
    assert_eq!(run(&update_g), 2);
    assert!(!h.was_cached());
    assert!(report
        .lock()
        .unwrap()
        .contains("Caching mode for function 'app::h' set to 'update' as it depends on 'app::g'"));

    assert_eq!(run(&cache), 2);
    assert!(h.was_cached());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn corrupt_record_is_deleted_and_recomputed() {
    let registry = Registry::new();
    let f = multiply(&registry, "1.0");
    let store = Arc::new(MemoryStore::new());
    let cache = Cache::new(store.clone());
    let calls = AtomicUsize::new(0);

    call_multiply(&f, &cache, 4, 5, &calls);
    let key = f.last_key().unwrap();
    assert!(store.overwrite_payload(&key, Vec::new()));

    assert_eq!(call_multiply(&f, &cache, 4, 5, &calls), 20);
    assert!(!f.was_cached());
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    assert_eq!(call_multiply(&f, &cache, 4, 5, &calls), 20);
    assert!(f.was_cached());
}

#[derive(Debug, PartialEq)]
enum AppError {
    Cache(String),
    Failed(&'static str),
}

impl From<CacheError> for AppError {
    fn from(e: CacheError) -> Self {
        AppError::Cache(e.to_string())
    }
}

#[test]
fn application_errors_pass_through_and_are_not_stored() {
    let registry = Registry::new();
    let f = multiply(&registry, "1.0");
    let store = Arc::new(MemoryStore::new());
    let cache = Cache::new(store.clone());

    let err = f
        .call(Some(&cache), CallArgs::new().arg(&1).arg(&2), |_| {
            Err::<i64, _>(AppError::Failed("division by zero"))
        })
        .unwrap_err();
    assert_eq!(err, AppError::Failed("division by zero"));
    assert!(store.is_empty());

    let err = f
        .call(Some(&cache), CallArgs::new().arg(&1), |_| Ok::<i64, AppError>(0))
        .unwrap_err();
    assert!(matches!(err, AppError::Cache(msg) if msg.contains("missing required")));
}

#[test]
fn nested_calls_report_one_level_deeper() {
    let registry = Registry::new();
    let inner_v = registry.version("app::inner", "1").declare().unwrap();
    let outer_v = registry
        .version("app::outer", "1")
        .depends_on(&inner_v)
        .declare()
        .unwrap();
    let inner = CachedFunction::new(inner_v, Signature::new(["x"]));
    let outer = CachedFunction::new(outer_v, Signature::new(["x"]));
    let (cache, report) = buffered(Cache::new(Arc::new(MemoryStore::new())));

    let value = outer
        .call(Some(&cache), CallArgs::new().arg(&3), |child| {
            let child = child.expect("child handle");
            assert_eq!(child.verbose().level(), 1);
            let doubled = inner.call(Some(&child), CallArgs::new().arg(&3), |_| {
                Ok::<_, CacheError>(6)
            })?;
            Ok::<_, CacheError>(doubled + 1)
        })
        .unwrap();
    assert_eq!(value, 7);

    let report = report.lock().unwrap();
    assert!(report.contains("01:   Wrote 'app::inner' cache memory:"));
    assert!(report.contains("00: Wrote 'app::outer' cache memory:"));
    assert_eq!(outer.version_id().unwrap(), "1 { app::inner: 1 }");
}

#[test]
fn auto_verbose_reports_below_the_function_context() {
    let registry = Registry::new();
    let versioned = registry.version("app::scaled", "1").declare().unwrap();
    let f = CachedFunction::new(versioned, Signature::new(["x"])).auto_verbose("verbose");
    let (cache, cache_report) = buffered(Cache::new(Arc::new(MemoryStore::new())));
    let (sink, own_report) = ReportSink::buffer();
    let own = Context::all().with_sink(sink).sub(2);

    let call = |cache: &Cache, args: CallArgs| -> i32 {
        f.call(Some(cache), args, |_| Ok::<_, CacheError>(10)).unwrap()
    };

    call(&cache, CallArgs::new().arg(&1).context("verbose", &own));
    let key = f.last_key().unwrap();
    {
        let own_report = own_report.lock().unwrap();
        assert!(own_report.starts_with("03: "));
        assert!(own_report.contains("Wrote 'app::scaled' cache"));
    }
    assert!(cache_report.lock().unwrap().is_empty());

    // the context argument is not part of the key
    call(&cache, CallArgs::new().arg(&1).context("verbose", &own.sub(5)));
    assert!(f.was_cached());
    assert_eq!(f.last_key().unwrap(), key);
    assert!(own_report.lock().unwrap().contains("08: "));

    own_report.lock().unwrap().clear();
    let quiet_cache = cache.with_verbose(Context::quiet());
    call(&quiet_cache, CallArgs::new().arg(&1).context("verbose", &own));
    assert!(f.was_cached());
    assert!(own_report.lock().unwrap().is_empty());

    call(&cache, CallArgs::new().arg(&1));
    assert!(f.was_cached());
    assert!(own_report.lock().unwrap().is_empty());
    assert!(cache_report.lock().unwrap().is_empty());
}

#[test]
fn unhashable_resources_can_be_passed_when_excluded() {
    let registry = Registry::new();
    let versioned = registry.version("app::load", "1").declare().unwrap();
    let f = CachedFunction::new(versioned, Signature::new(["path", "pool"])).exclude(["pool"]);
    let cache = Cache::new(Arc::new(MemoryStore::new()));
    let pool = Mutex::new(0usize);

    for _ in 0..2 {
        let len: usize = f
            .call(
                Some(&cache),
                CallArgs::new().arg("data.csv").opaque(&pool),
                |_| {
                    *pool.lock().unwrap() += 1;
                    Ok::<_, CacheError>(8)
                },
            )
            .unwrap();
        assert_eq!(len, 8);
    }
    assert!(f.was_cached());
    assert_eq!(*pool.lock().unwrap(), 1);
}

#[test]
fn directory_store_survives_new_instances() {
    let dir = tempfile::tempdir().unwrap();
    let calls = AtomicUsize::new(0);

    for compress in [false, true] {
        let store = DirStore::new(dir.path()).with_compression(compress);
        let cache = Cache::new(Arc::new(store));
        let f = multiply(&Registry::new(), if compress { "gz" } else { "raw" });
        call_multiply(&f, &cache, 6, 7, &calls);
        let file = f.last_file().unwrap();
        assert!(std::path::Path::new(&file).is_file());

        let again = multiply(&Registry::new(), if compress { "gz" } else { "raw" });
        assert_eq!(call_multiply(&again, &cache, 6, 7, &calls), 42);
        assert!(again.was_cached());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let store = DirStore::new(dir.path());
    assert_eq!(store.keys().unwrap().len(), 1);
    assert_eq!(store.clear().unwrap(), 1);
}
