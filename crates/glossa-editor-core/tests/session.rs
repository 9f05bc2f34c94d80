use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use glossa_common::documents::{DEFAULT_TITLE, UNTITLED};
use glossa_common::{Analyzer, AnalyzerError, DocumentStore, MemoryStore};
use glossa_editor_core::{
    AnalysisDriver, AnalysisPhase, CursorOffset, EditorSession, EditorSurface, MemorySurface,
    annotations,
};
use n0_future::time::{Duration, sleep};

const DEBOUNCE: Duration = Duration::from_millis(1000);

struct GlossaryAnalyzer {
    calls: RefCell<Vec<String>>,
}

impl Analyzer for GlossaryAnalyzer {
    fn analyze(&self, text: String) -> impl Future<Output = Result<String, AnalyzerError>> {
        let reply = if text.to_lowercase().contains("compiler") {
            r#"[{"term":"compiler","definition":"Translates source code"}]"#
        } else {
            "[]"
        };
        self.calls.borrow_mut().push(text);
        async move {
            sleep(Duration::from_millis(50)).await;
            Ok(reply.to_owned())
        }
    }
}

type Surface = Rc<RefCell<MemorySurface>>;

fn setup() -> (
    EditorSession<MemoryStore, Surface>,
    AnalysisDriver<Rc<GlossaryAnalyzer>, Surface>,
    Rc<GlossaryAnalyzer>,
    Surface,
) {
    let analyzer = Rc::new(GlossaryAnalyzer {
        calls: RefCell::new(Vec::new()),
    });
    let surface: Surface = Rc::new(RefCell::new(MemorySurface::default()));
    let (driver, handle) = AnalysisDriver::new(analyzer.clone(), surface.clone(), DEBOUNCE);
    let store = DocumentStore::load(MemoryStore::new());
    let session = EditorSession::new(store, surface.clone(), handle).unwrap();
    (session, driver, analyzer, surface)
}

/// Simulate typing: replace the surface content and leave the caret at `caret`.
fn type_into(surface: &Surface, markup: &str, caret: usize) {
    let mut s = surface.borrow_mut();
    s.set_markup(markup).unwrap();
    s.place_cursor(caret);
}

#[test]
fn opens_welcome_document() {
    let (session, _driver, _analyzer, surface) = setup();
    assert_eq!(session.store().active().unwrap().title, DEFAULT_TITLE);
    assert_eq!(
        surface.borrow().plain_text(),
        "Start writing your notes here..."
    );
}

#[test]
fn edits_reach_the_store() {
    let (mut session, _driver, _analyzer, surface) = setup();
    let id = session.store().active_id().unwrap().clone();

    type_into(&surface, "<p>Draft</p>", 5);
    let doc = session.on_input().unwrap().unwrap();
    assert_eq!(doc.id, id);
    assert_eq!(doc.content, "<p>Draft</p>");
    assert_eq!(session.store().get(&id).unwrap().content, "<p>Draft</p>");

    let renamed = session.set_title("Plans").unwrap().unwrap();
    assert_eq!(renamed.title, "Plans");
}

#[test]
fn create_and_delete_switch_the_surface() {
    let (mut session, _driver, _analyzer, surface) = setup();
    let welcome = session.store().active_id().unwrap().clone();

    let created = session.create_document().unwrap();
    assert_eq!(created.title, UNTITLED);
    assert_eq!(session.store().active_id(), Some(&created.id));
    assert_eq!(surface.borrow().markup(), "");

    session.delete_document(&created.id).unwrap();
    assert_eq!(session.store().active_id(), Some(&welcome));
    assert_eq!(
        surface.borrow().markup(),
        "Start writing your notes here..."
    );

    session.delete_document(&welcome).unwrap();
    assert_eq!(session.store().active_id(), None);
    assert_eq!(surface.borrow().markup(), "");
    assert_eq!(session.on_input().unwrap(), None);
}

#[test]
fn format_commands_go_to_the_surface() {
    let (mut session, _driver, _analyzer, surface) = setup();
    session.apply_format("bold", None).unwrap();
    session.apply_format("fontSize", Some("5")).unwrap();
    assert!(session.apply_format("fontSize", Some("12")).is_err());
    assert!(session.apply_format("explode", None).is_err());
    assert_eq!(surface.borrow().executed().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn typing_annotates_after_quiet_period() {
    let (mut session, driver, analyzer, surface) = setup();

    let script = async move {
        type_into(&surface, "<p>The compiler</p>", 12);
        session.on_input().unwrap();
        sleep(Duration::from_millis(300)).await;
        type_into(&surface, "<p>The compiler checks types</p>", 12);
        session.on_input().unwrap();
        sleep(Duration::from_millis(2000)).await;

        let markup = surface.borrow().markup();
        let found = annotations(&markup);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "compiler");
        assert_eq!(found[0].definition, "Translates source code");
        assert_eq!(surface.borrow().capture_cursor(), Some(CursorOffset::new(12)));

        // Annotated markup is picked up with the next edit.
        session.on_input().unwrap();
        let active = session.store().active().unwrap();
        assert!(active.content.contains("term-highlight"));

        // That edit schedules one more pass, which finds nothing new to wrap.
        sleep(Duration::from_millis(2000)).await;
        assert_eq!(annotations(&surface.borrow().markup()).len(), 1);
    };
    let (scheduler, ()) = tokio::join!(driver.run(), script);

    assert_eq!(scheduler.phase(), AnalysisPhase::Idle);
    // Opening the welcome note queued its text, then two edits coalesced.
    assert_eq!(
        *analyzer.calls.borrow(),
        vec!["The compiler checks types", "The compiler checks types"]
    );
}
