use assert_cmd::Command;
use dom_waiter::document::HtmlDocument;
use dom_waiter::script::{run_script, ScriptTarget};
use dom_waiter::timer::{ManualTimer, TokioTimer};
use dom_waiter::{SelectorQuery, WaitConfig, Waiters};
use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

fn fixture_path(name: &str) -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir).join("fixtures").join(name)
}

fn fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).expect("Failed to read fixture")
}

struct Page {
    timer: Rc<ManualTimer>,
    doc: Rc<HtmlDocument>,
    waiters: Waiters,
}

impl Page {
    fn new(html: &str) -> Self {
        let timer = Rc::new(ManualTimer::new());
        let doc = Rc::new(HtmlDocument::parse(html));
        let waiters = Waiters::new(timer.clone(), doc.clone());
        Self { timer, doc, waiters }
    }

    fn advance_ms(&self, ms: u64) {
        self.timer.advance(Duration::from_millis(ms));
    }
}

fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&str) -> Box<dyn FnOnce()>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    let make = move |label: &str| -> Box<dyn FnOnce()> {
        let sink = sink.clone();
        let label = label.to_string();
        Box::new(move || sink.borrow_mut().push(label))
    };
    (log, make)
}

// ── Facade Tests ────────────────────────────────────────────────────────

#[test]
fn test_present_element_fires_synchronously() {
    let page = Page::new(r#"<div id="app"></div>"#);
    let (log, cb) = recorder();

    page.waiters.on_element_available("#app", cb("app"));

    assert_eq!(*log.borrow(), vec!["app"]);
    assert_eq!(page.timer.scheduled_count(), 0);
}

#[test]
fn test_element_rendered_later() {
    let page = Page::new("<body></body>");
    let (log, cb) = recorder();

    page.waiters.on_element_available(".card", cb("card"));
    page.advance_ms(50);
    assert!(log.borrow().is_empty());

    page.doc.load(r#"<div class="card"></div>"#);
    page.advance_ms(10);
    assert_eq!(*log.borrow(), vec!["card"]);

    page.advance_ms(100);
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(page.timer.active_count(), 0);
}

#[test]
fn test_all_elements_empty_list_fires_synchronously() {
    let page = Page::new("");
    let (log, cb) = recorder();
    let selectors: Vec<String> = Vec::new();

    page.waiters.all_elements_available(&selectors, cb("none"));
    assert_eq!(*log.borrow(), vec!["none"]);
}

#[test]
fn test_all_elements_single_matches_single_wait() {
    let single = Page::new("");
    let listed = Page::new("");
    let (log, cb) = recorder();

    single.waiters.on_element_available("#x", cb("single"));
    listed.waiters.all_elements_available(&["#x"], cb("listed"));

    for page in [&single, &listed] {
        page.advance_ms(30);
        page.doc.load(r#"<b id="x"></b>"#);
        page.advance_ms(10);
        assert_eq!(page.timer.now(), Duration::from_millis(40));
    }
    assert_eq!(*log.borrow(), vec!["single", "listed"]);
    assert_eq!(single.timer.scheduled_count(), listed.timer.scheduled_count());
}

/// Counts queries per selector on top of a real document.
struct CountingQuery {
    inner: HtmlDocument,
    counts: RefCell<Vec<String>>,
}

impl SelectorQuery for CountingQuery {
    fn select(
        &self,
        selector: &str,
    ) -> Result<Vec<dom_waiter::NodeMatch>, dom_waiter::QueryError> {
        self.counts.borrow_mut().push(selector.to_string());
        self.inner.select(selector)
    }
}

#[test]
fn test_second_selector_not_polled_before_first_matches() {
    let timer = Rc::new(ManualTimer::new());
    let query = Rc::new(CountingQuery {
        inner: HtmlDocument::empty(),
        counts: RefCell::new(Vec::new()),
    });
    let waiters = Waiters::new(timer.clone(), query.clone());
    let fired_at = Rc::new(Cell::new(None));
    let stamp = fired_at.clone();
    let clock = timer.clone();

    waiters.all_elements_available(&["#s1", "#s2"], move || stamp.set(Some(clock.now())));

    timer.advance(Duration::from_millis(20));
    assert!(query.counts.borrow().iter().all(|s| s == "#s1"));

    query.inner.load(r#"<i id="s1"></i>"#);
    timer.advance(Duration::from_millis(10));
    assert_eq!(query.counts.borrow().last().map(String::as_str), Some("#s2"));

    timer.advance(Duration::from_millis(20));
    query.inner.load(r#"<i id="s1"></i><i id="s2"></i>"#);
    timer.advance(Duration::from_millis(10));
    assert_eq!(fired_at.get(), Some(Duration::from_millis(60)));
}

#[test]
fn test_input_value_exact_match_only() {
    let page = Page::new(r#"<input id="size" value="">"#);
    let (log, cb) = recorder();

    page.waiters.on_input_has_value("#size", "x", cb("x"));
    for typed in ["X", "x ", " x"] {
        page.doc.set_value("#size", typed).unwrap();
        page.advance_ms(10);
    }
    assert!(log.borrow().is_empty());

    page.doc.set_value("#size", "x").unwrap();
    page.advance_ms(10);
    assert_eq!(*log.borrow(), vec!["x"]);
}

#[test]
fn test_input_value_reads_first_match() {
    let page = Page::new(r#"<input class="f" value="a"><input class="f" value="b">"#);
    let (log, cb) = recorder();

    page.waiters.on_input_has_value(".f", "b", cb("b"));
    page.advance_ms(100);
    assert!(log.borrow().is_empty());

    page.waiters.on_input_has_value(".f", "a", cb("a"));
    assert_eq!(*log.borrow(), vec!["a"]);
}

#[test]
fn test_independent_waits_each_fire() {
    let page = Page::new("");
    let (log, cb) = recorder();

    for label in ["one", "two", "three"] {
        page.waiters.on_element_available("#shared", cb(label));
    }
    page.doc.load(r#"<span id="shared"></span>"#);
    page.advance_ms(10);

    assert_eq!(*log.borrow(), vec!["one", "two", "three"]);
}

#[test]
fn test_invalid_selector_drops_wait_quietly() {
    let page = Page::new("");
    let (log, cb) = recorder();

    page.waiters.on_element_available("div[", cb("never"));
    page.advance_ms(100);

    assert!(log.borrow().is_empty());
    assert_eq!(page.timer.scheduled_count(), 0);
}

// ── Real-time Timer Tests ──────────────────────────────────────────────

#[tokio::test]
async fn test_tokio_timer_drives_waiters() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let timer = Rc::new(TokioTimer::new());
            let doc = Rc::new(HtmlDocument::empty());
            let waiters = Waiters::new(timer.clone(), doc.clone());
            let fired = Rc::new(Cell::new(0));
            let count = fired.clone();

            waiters.on_element_available("#async", move || count.set(count.get() + 1));
            tokio::time::sleep(Duration::from_millis(40)).await;
            assert_eq!(fired.get(), 0);
            assert_eq!(timer.active_count(), 1);

            doc.load(r#"<p id="async"></p>"#);
            tokio::time::sleep(Duration::from_millis(60)).await;
            assert_eq!(fired.get(), 1);
            assert_eq!(timer.active_count(), 0);

            tokio::time::sleep(Duration::from_millis(30)).await;
            assert_eq!(fired.get(), 1);
        })
        .await;
}

// ── run_script Tests ──────────────────────────────────────────────────

#[test]
fn test_run_script_catalog_fixture() {
    let result = run_script(
        &fixture("catalog.js"),
        ScriptTarget::html(&fixture("catalog.html")),
        &WaitConfig::default(),
    );

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.output, "query typed\nresults rendered");
    assert_eq!(result.virtual_ms, 170);
    assert_eq!(result.pending_timers, 0);
}

#[test]
fn test_run_script_catalog_with_config_file() {
    let config = WaitConfig::from_file(&fixture_path("config.json")).unwrap();
    let result = run_script(
        &fixture("catalog.js"),
        ScriptTarget::html(&fixture("catalog.html")),
        &config,
    );

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.virtual_ms, 175);
}

#[test]
fn test_run_script_realtime_sleeps() {
    let config = WaitConfig::default().with_realtime(true);
    let started = std::time::Instant::now();
    let result = run_script(
        "setTimeout(() => console.log('done'), 50);",
        ScriptTarget::html(""),
        &config,
    );

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.output, "done");
    assert!(started.elapsed() >= Duration::from_millis(50));
}

// ── CLI Tests ──────────────────────────────────────────────────────────

#[test]
fn test_cli_runs_script_against_html() {
    let assert = Command::cargo_bin("dom-waiter")
        .unwrap()
        .arg(fixture_path("catalog.js"))
        .arg("--html")
        .arg(fixture_path("catalog.html"))
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("Script completed"));
    assert!(stdout.contains("  query typed\n  results rendered"));
}

#[test]
fn test_cli_reports_pending_waits() {
    let assert = Command::cargo_bin("dom-waiter")
        .unwrap()
        .arg(fixture_path("never.js"))
        .args(["--budget-ms", "200", "--interval-ms", "50"])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("(200ms of timer time)"));
    assert!(stdout.contains("Pending: 1 wait(s)"));
}

#[test]
fn test_cli_fails_on_throwing_callback() {
    let assert = Command::cargo_bin("dom-waiter")
        .unwrap()
        .arg(fixture_path("broken.js"))
        .assert()
        .failure();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("Script failed"));
    assert!(stdout.contains("callback exploded"));
}

#[test]
fn test_cli_rejects_zero_interval() {
    Command::cargo_bin("dom-waiter")
        .unwrap()
        .arg(fixture_path("never.js"))
        .args(["--interval-ms", "0"])
        .assert()
        .failure();
}

// ── Live Page Tests ────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a local Chrome"]
async fn test_live_page_wait() {
    use dom_waiter::browser::BrowserSession;
    use dom_waiter::document::ChromeDocument;

    let session = BrowserSession::launch(true).await.unwrap();
    let url = format!("file://{}", fixture_path("catalog.html").display());
    let page = session.open(&url).await.unwrap();
    let handle = tokio::runtime::Handle::current();

    let result = tokio::task::spawn_blocking(move || {
        let document = Rc::new(ChromeDocument::new(handle, page));
        run_script(
            "allElementsAvailable(['#search', '#results'], () => console.log('ready'));\n\
             onInputHasValue('#sort', 'relevance', () => console.log('sorted'));",
            ScriptTarget::Live(document),
            &WaitConfig::default().with_realtime(true).with_budget(5_000),
        )
    })
    .await
    .unwrap();

    session.close().await.unwrap();
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.output, "ready\nsorted");
}
