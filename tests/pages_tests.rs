use std::io::Write;
use std::sync::Arc;

use http::StatusCode;
use pagetree::{
    htmx_page_config, render_fn, Component, Dep, Error, Page, Pages, PathParams, PrintRouter,
    Props, Request, ResponseWriter, Router, ServeMux, TypeRegistry,
};
use parking_lot::Mutex;

mod common;
use common::{recording_error_handler, serve};

#[derive(Default, Page)]
#[page(
    component(Page = page, Content = content),
    props(PageProps = page_props, Props = props)
)]
struct PropsPage;

impl PropsPage {
    fn page_props(&self) -> String {
        "Page Props".to_string()
    }

    fn props(&self) -> String {
        "Default Props".to_string()
    }

    fn page(&self, props: Props<String>) -> String {
        format!("page: {}", *props)
    }

    fn content(&self, props: Props<String>) -> String {
        format!("content: {}", *props)
    }
}

#[derive(Default, Page)]
struct PropsSite {
    #[route("GET /props Props")]
    props: PropsPage,
}

fn htmx_mux() -> ServeMux {
    let mut mux = ServeMux::new();
    Pages::new()
        .with_default_page_config(htmx_page_config)
        .mount(&mut mux, PropsSite::default(), "/", TypeRegistry::new())
        .unwrap();
    mux
}

#[test]
fn test_component_specific_props_win() {
    let rec = serve(&htmx_mux(), "GET", "/props", &[]);
    assert_eq!(rec.status(), StatusCode::OK);
    assert_eq!(rec.body_string(), "page: Page Props");
    assert_eq!(rec.header("content-type"), Some("text/html; charset=utf-8"));
}

#[test]
fn test_htmx_target_selects_component_with_default_props() {
    let mux = htmx_mux();
    let rec = serve(
        &mux,
        "GET",
        "/props",
        &[("HX-Request", "true"), ("HX-Target", "content")],
    );
    assert_eq!(rec.body_string(), "content: Default Props");

    // Without HX-Request the target header is ignored.
    let rec = serve(&mux, "GET", "/props", &[("HX-Target", "content")]);
    assert_eq!(rec.body_string(), "page: Page Props");
}

#[test]
fn test_htmx_unknown_target_reports_error() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let mut mux = ServeMux::new();
    Pages::new()
        .with_default_page_config(htmx_page_config)
        .with_error_handler(recording_error_handler(Arc::clone(&errors)))
        .mount(&mut mux, PropsSite::default(), "/", TypeRegistry::new())
        .unwrap();

    let rec = serve(
        &mux,
        "GET",
        "/props",
        &[("HX-Request", "true"), ("HX-Target", "sidebar")],
    );
    assert_eq!(rec.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        errors.lock().as_slice(),
        ["default PageConfig for props returned unknown component name: Sidebar"]
    );
}

#[derive(Default, Page)]
#[page(component(Page = page, Content = content), page_config = page_config)]
struct Configured;

impl Configured {
    fn page_config(&self, req: &Request) -> String {
        match req.uri().query() {
            Some("partial") => "Content".to_string(),
            Some("bogus") => "Nope".to_string(),
            _ => "Page".to_string(),
        }
    }

    fn page(&self) -> &'static str {
        "<html>full</html>"
    }

    fn content(&self) -> &'static str {
        "<div>partial</div>"
    }
}

#[derive(Default, Page)]
struct ConfiguredSite {
    #[route("/configured")]
    configured: Configured,
}

#[test]
fn test_page_config_method_overrides_default_selector() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let mut mux = ServeMux::new();
    Pages::new()
        .with_default_page_config(|_: &Request| Ok("Content".to_string()))
        .with_error_handler(recording_error_handler(Arc::clone(&errors)))
        .mount(&mut mux, ConfiguredSite::default(), "/", TypeRegistry::new())
        .unwrap();

    assert_eq!(
        serve(&mux, "GET", "/configured", &[]).body_string(),
        "<html>full</html>"
    );
    assert_eq!(
        serve(&mux, "POST", "/configured?partial", &[]).body_string(),
        "<div>partial</div>"
    );

    let rec = serve(&mux, "GET", "/configured?bogus", &[]);
    assert_eq!(rec.body_string(), "custom error");
    assert_eq!(
        errors.lock().as_slice(),
        ["PageConfig method for configured returned unknown component name: Nope"]
    );
}

#[derive(Default, Page)]
#[page(component(Page = page))]
struct Exploding;

impl Exploding {
    fn page(&self) -> Box<dyn Component> {
        Box::new(render_fn(|_req, sink| {
            sink.write_all(b"<p>half a page")?;
            anyhow::bail!("template exploded")
        }))
    }
}

#[derive(Default, Page)]
#[page(component(Page = page))]
struct Failing;

impl Failing {
    fn page(&self) -> anyhow::Result<String> {
        Err(anyhow::anyhow!("db down"))
    }
}

#[derive(Default, Page)]
struct FailureSite {
    #[route("GET /exploding")]
    exploding: Exploding,
    #[route("GET /failing")]
    failing: Failing,
}

#[test]
fn test_render_failure_discards_partial_output() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let mut mux = ServeMux::new();
    Pages::new()
        .with_error_handler(recording_error_handler(Arc::clone(&errors)))
        .mount(&mut mux, FailureSite::default(), "/", TypeRegistry::new())
        .unwrap();

    let rec = serve(&mux, "GET", "/exploding", &[]);
    assert_eq!(rec.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(rec.body_string(), "custom error");
    assert!(rec.header("content-type").is_none());

    let rec = serve(&mux, "GET", "/failing", &[]);
    assert_eq!(rec.body_string(), "custom error");
    assert_eq!(
        errors.lock().as_slice(),
        [
            "template exploded",
            "error calling component failing.Page: db down"
        ]
    );
}

#[test]
fn test_default_error_handler_answers_500() {
    let mut mux = ServeMux::new();
    Pages::new()
        .mount(&mut mux, FailureSite::default(), "/", TypeRegistry::new())
        .unwrap();
    let rec = serve(&mux, "GET", "/failing", &[]);
    assert_eq!(rec.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(rec.body_string(), "Internal Server Error\n");
}

#[derive(Clone)]
struct Greeting(&'static str);

#[derive(Default, Page)]
#[page(handler = serve)]
struct Direct;

impl Direct {
    fn serve(&self, w: &mut dyn ResponseWriter, req: &Request) {
        w.write_header(StatusCode::ACCEPTED);
        let _ = write!(w, "direct {}", req.uri().path());
    }
}

#[derive(Default, Page)]
#[page(handler = serve)]
struct Buffered;

impl Buffered {
    fn serve(
        &self,
        w: &mut dyn ResponseWriter,
        req: &Request,
        greeting: Dep<Greeting>,
    ) -> anyhow::Result<()> {
        write!(w, "{} ", greeting.0 .0)?;
        if req.uri().query() == Some("fail") {
            anyhow::bail!("backend unavailable");
        }
        write!(w, "world")?;
        Ok(())
    }
}

#[derive(Default, Page)]
struct HandlerSite {
    #[route("/direct")]
    direct: Direct,
    #[route("GET /buffered")]
    buffered: Buffered,
}

#[test]
fn test_full_handlers() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let mut registry = TypeRegistry::new();
    registry.add(Greeting("hello")).unwrap();
    let mut mux = ServeMux::new();
    Pages::new()
        .with_error_handler(recording_error_handler(Arc::clone(&errors)))
        .mount(&mut mux, HandlerSite::default(), "/", registry)
        .unwrap();

    let rec = serve(&mux, "DELETE", "/direct", &[]);
    assert_eq!(rec.status(), StatusCode::ACCEPTED);
    assert_eq!(rec.body_string(), "direct /direct");

    assert_eq!(serve(&mux, "GET", "/buffered", &[]).body_string(), "hello world");

    let rec = serve(&mux, "GET", "/buffered?fail", &[]);
    assert_eq!(rec.body_string(), "custom error");
    assert_eq!(
        errors.lock().as_slice(),
        ["error calling ServeHTTP method for buffered: backend unavailable"]
    );
}

#[derive(Default, Page)]
#[page(init = init, component(Page = page))]
struct Dashboard {
    greeting: Option<&'static str>,
}

impl Dashboard {
    fn init(&mut self, greeting: Dep<Greeting>) {
        self.greeting = Some(greeting.0 .0);
    }

    fn page(&self) -> String {
        self.greeting.unwrap_or("unset").to_string()
    }
}

#[test]
fn test_init_injects_from_registry() {
    let mut registry = TypeRegistry::new();
    registry.add(Greeting("welcome back")).unwrap();
    let mut mux = ServeMux::new();
    Pages::new()
        .mount(&mut mux, Dashboard::default(), "GET /dash", registry)
        .unwrap();
    assert_eq!(serve(&mux, "GET", "/dash", &[]).body_string(), "welcome back");
}

#[test]
fn test_missing_dependency_aborts_mount() {
    let mut mux = ServeMux::new();
    let err = Pages::new()
        .mount(&mut mux, Dashboard::default(), "GET /dash", TypeRegistry::new())
        .unwrap_err();
    assert!(matches!(err.root(), Error::MissingArgument { .. }));
    assert!(mux.is_empty());
}

#[derive(Default, Page)]
struct Hollow;

#[test]
fn test_page_without_capabilities_is_rejected() {
    let mut mux = ServeMux::new();
    let err = Pages::new()
        .mount(&mut mux, Hollow, "/hollow", TypeRegistry::new())
        .unwrap_err();
    assert!(matches!(err.root(), Error::Config(_)));
}

#[test]
fn test_config_content_type_applies() {
    let config = pagetree::Config::from_toml_str("content_type = \"text/plain\"").unwrap();
    let mut mux = ServeMux::new();
    Pages::new()
        .with_config(config)
        .mount(&mut mux, PropsSite::default(), "/", TypeRegistry::new())
        .unwrap();
    let rec = serve(&mux, "GET", "/props", &[]);
    assert_eq!(rec.header("content-type"), Some("text/plain"));
}

#[derive(Default, Page)]
#[page(component(Page = page))]
struct Item;

impl Item {
    fn page(&self, req: &Request) -> String {
        let id = req
            .extensions()
            .get::<PathParams>()
            .and_then(|p| p.get("id"))
            .unwrap_or("none");
        format!("item {}", id)
    }
}

#[derive(Default, Page)]
struct PartlyHollowSite {
    #[route("GET /items/{id}")]
    item: Item,
    #[route("GET /hollow")]
    hollow: Hollow,
}

#[test]
fn test_failed_mount_registers_nothing() {
    let mut mux = ServeMux::new();
    mux.handle_method("GET", "/keep", pagetree::handler_fn(|w, _req| {
        let _ = w.write_body(b"kept");
    }))
    .unwrap();
    let err = Pages::new()
        .mount(&mut mux, PartlyHollowSite::default(), "/", TypeRegistry::new())
        .unwrap_err();
    assert!(matches!(err.root(), Error::Config(_)));
    assert_eq!(mux.len(), 1);
    assert_eq!(serve(&mux, "GET", "/items/1", &[]).status(), StatusCode::NOT_FOUND);
    assert_eq!(serve(&mux, "GET", "/keep", &[]).body_string(), "kept");

    let mut router = PrintRouter::new();
    Pages::new()
        .mount(&mut router, PartlyHollowSite::default(), "/", TypeRegistry::new())
        .unwrap_err();
    assert!(router.registrations().is_empty());
}

#[derive(Default, Page)]
struct ItemSite {
    #[route("GET /items/{id}")]
    item: Item,
    #[route("GET /keep")]
    keep: Configured,
}

#[test]
fn test_router_conflict_rolls_back_whole_mount() {
    let mut mux = ServeMux::new();
    mux.handle_method("GET", "/keep", pagetree::handler_fn(|w, _req| {
        let _ = w.write_body(b"kept");
    }))
    .unwrap();
    let err = Pages::new()
        .mount(&mut mux, ItemSite::default(), "/", TypeRegistry::new())
        .unwrap_err();
    assert!(matches!(err.root(), Error::Config(_)));
    assert!(err.to_string().contains("page keep"), "{}", err);
    assert_eq!(mux.len(), 1);
    assert_eq!(serve(&mux, "GET", "/items/1", &[]).status(), StatusCode::NOT_FOUND);
}

#[derive(Default, Page)]
#[page(component(Page = page))]
struct Tally {
    hits: u64,
}

impl Tally {
    fn page(&mut self) -> String {
        self.hits += 1;
        self.hits.to_string()
    }
}

#[test]
fn test_component_taking_mut_self_fails_mount() {
    let mut mux = ServeMux::new();
    let err = Pages::new()
        .mount(&mut mux, Tally::default(), "GET /tally", TypeRegistry::new())
        .unwrap_err();
    assert!(matches!(err.root(), Error::InvalidCapability(_)));
    assert!(mux.is_empty());
}

#[test]
fn test_concurrent_requests_share_one_mux() {
    let mut mux = ServeMux::new();
    Pages::new()
        .mount(&mut mux, ItemSite::default(), "/", TypeRegistry::new())
        .unwrap();

    std::thread::scope(|scope| {
        for worker in 0..8 {
            let mux = &mux;
            scope.spawn(move || {
                for i in 0..50 {
                    let id = format!("{}-{}", worker, i);
                    let rec = serve(mux, "GET", &format!("/items/{}", id), &[]);
                    assert_eq!(rec.status(), StatusCode::OK);
                    assert_eq!(rec.body_string(), format!("item {}", id));
                }
            });
        }
    });
}
