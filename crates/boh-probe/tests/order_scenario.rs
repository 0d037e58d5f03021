//! End-to-end runs of the order scenario against a scripted back office.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use boh_probe::mock::{Effect, MockElement, Readiness, Screen, ScriptedPage};
use boh_probe::{OrderScenario, ProbeConfig, ScenarioReport, ScreenshotOnFailure, Step, StepStatus};
use serde_json::json;

const LOGIN: &str = "https://saas-auth-qa.example/page/login";
const HOME: &str = "https://saas-boh-qa.example/home";
const ORDERS: &str = "https://saas-boh-qa.example/store-supply/demand-daily";
const DETAIL: &str = "https://saas-boh-qa.example/store-supply/demand-daily/detail/342512080002";

const ROW: &str = "342512080002 已审核 WEN测试直营门店01 总部分配 2025-12-08";
const HEADER_ROW: &str = "商品编号 商品名称 订货数量";
const ITEM_ROW: &str = "T20251128012 测试20251128012 10";
const DETAIL_LOADING: &str = "订货单号：- 单据状态：- 来源：- 订货日期：- 订货门店：-";

fn detail_loaded() -> String {
    format!(
        "订货单号：342512080002 单据状态：已审核 来源：总部分配 订货日期：2025-12-08 \
         订货门店：WEN测试直营门店01 订货门店编号：100000010 {HEADER_ROW} {ITEM_ROW}"
    )
}

fn login_screen(redirects: bool) -> Screen {
    let submit = if redirects { Effect::navigate(HOME) } else { Effect::None };
    Screen::new(LOGIN)
        .title("登录")
        .with_element(MockElement::new("account").tag("input[name=\"account\"]"))
        .with_element(MockElement::new("password").tag("input[type=\"password\"]"))
        .with_element(MockElement::new("agree").tag("input[type=\"checkbox\"]"))
        .with_element(MockElement::new("submit").tag("button").text("登录").on_click(submit))
}

fn home_screen() -> Screen {
    Screen::new(HOME)
        .title("首页")
        .body("合阔x 工作台")
        .with_element(MockElement::new("tenant").tag("span").text("合阔x"))
}

fn orders_screen() -> Screen {
    Screen::new(ORDERS)
        .body(format!("订货单 订货单号 单据状态 {ROW}"))
        .with_element(
            MockElement::new("start")
                .tag("input[placeholder*=\"开始\"]")
                .on_click(Effect::reveal(["calendar", "day-start"])),
        )
        .with_element(
            MockElement::new("end")
                .tag("input[placeholder*=\"结束\"]")
                .on_click(Effect::reveal(["calendar", "day-end"])),
        )
        .with_element(MockElement::new("calendar").tag("[class*=\"calendar\"]").hidden())
        .with_element(
            MockElement::new("day-start")
                .tag("[aria-label*=\"2025-12-01\"]")
                .inside("calendar")
                .hidden(),
        )
        .with_element(
            MockElement::new("day-end")
                .tag("[aria-label*=\"2025-12-31\"]")
                .inside("calendar")
                .hidden(),
        )
        .with_element(MockElement::new("query").tag("button").text("查询"))
        .with_element(MockElement::new("row").tag("tr").text(ROW))
        .with_element(
            MockElement::new("order-cell")
                .tag("td")
                .text("342512080002")
                .inside("row")
                .on_click(Effect::navigate(DETAIL)),
        )
}

fn detail_screen(readiness: Readiness, items: usize) -> Screen {
    let mut screen = Screen::new(DETAIL)
        .body(detail_loaded())
        .loading(DETAIL_LOADING, readiness)
        .with_element(MockElement::new("items-header").tag("table tr").text(HEADER_ROW));
    for i in 0..items {
        screen = screen.with_element(MockElement::new(format!("item-{i}")).tag("table tr").text(ITEM_ROW));
    }
    screen
}

fn back_office(redirects: bool, readiness: Readiness) -> ScriptedPage {
    ScriptedPage::new("about:blank")
        .with_screen(login_screen(redirects))
        .with_screen(home_screen())
        .with_screen(orders_screen())
        .with_screen(detail_screen(readiness, 1))
}

fn outcome(report: &ScenarioReport, step: Step) -> serde_json::Value {
    report
        .step(step)
        .and_then(|r| r.outcome.clone())
        .unwrap_or_else(|| panic!("{step} has no outcome: {:?}", report.error))
}

#[tokio::test(start_paused = true)]
async fn test_happy_path_passes_every_step() {
    let config = ProbeConfig::default();
    let page = back_office(true, Readiness::AfterReads(3));

    let report = OrderScenario::new(&config).run(&page).await;

    assert!(report.passed, "{:?}", report.error);
    assert_eq!(report.count(StepStatus::Passed), Step::ALL.len());
    assert!(report.artifacts.is_empty());

    let login = outcome(&report, Step::Login);
    assert_eq!(login["submit"], json!("button"));
    assert_eq!(login["landed_url"], json!(HOME));
    assert_eq!(login["agreement_checked"], json!(true));
    assert_eq!(page.value_of("account").as_deref(), Some("admin"));

    let query = outcome(&report, Step::QueryDateRange);
    assert_eq!(query["start"], json!("picker"));
    assert_eq!(query["end"], json!("picker"));
    assert_eq!(query["renavigated"], json!(false));

    assert_eq!(outcome(&report, Step::VerifyOrderList)["source"], json!("exact_text"));
    assert_eq!(outcome(&report, Step::OpenOrderDetail), json!("exact_text"));
    assert_eq!(outcome(&report, Step::VerifyOrderDetail)["reloaded"], json!(false));
    assert_eq!(outcome(&report, Step::VerifyLineItems)["rows"], json!(1));
    assert_eq!(page.current_url(), DETAIL);
    assert_eq!(page.reloads(DETAIL), 0);
}

#[tokio::test(start_paused = true)]
async fn test_login_without_redirect_stops_the_run() {
    let config = ProbeConfig::default();
    let page = back_office(false, Readiness::Immediate);
    let dir = tempfile::tempdir().unwrap();

    let report = OrderScenario::new(&config)
        .with_artifacts(ScreenshotOnFailure::new(dir.path()))
        .run(&page)
        .await;

    assert!(!report.passed);
    assert_eq!(report.failed_step(), Some(Step::Login));
    assert_eq!(report.count(StepStatus::Skipped), Step::ALL.len() - 1);
    let error = report.error.clone().unwrap();
    assert!(error.contains("still on the login page"), "{error}");
    assert_eq!(report.artifacts.len(), 1);
    assert!(report.artifacts[0].exists());
    assert_eq!(page.current_url(), LOGIN);
}

#[tokio::test(start_paused = true)]
async fn test_detail_page_recovers_after_one_reload() {
    let config = ProbeConfig::default();
    let page = back_office(true, Readiness::AfterReload);

    let report = OrderScenario::new(&config).run(&page).await;

    assert!(report.passed, "{:?}", report.error);
    let detail = outcome(&report, Step::VerifyOrderDetail);
    assert_eq!(detail["reloaded"], json!(true));
    assert_eq!(detail["first_wait_attempts"], json!(15));
    assert_eq!(detail["reload_wait_attempts"], json!(1));
    assert_eq!(page.reloads(DETAIL), 1);
}

#[tokio::test(start_paused = true)]
async fn test_detail_page_that_never_loads_is_fatal() {
    let config = ProbeConfig::default();
    let page = back_office(true, Readiness::Never);
    let dir = tempfile::tempdir().unwrap();

    let report = OrderScenario::new(&config)
        .with_name("never loads")
        .with_artifacts(ScreenshotOnFailure::new(dir.path()))
        .run(&page)
        .await;

    assert!(!report.passed);
    assert_eq!(report.failed_step(), Some(Step::VerifyOrderDetail));
    assert_eq!(report.step(Step::VerifyLineItems).unwrap().status, StepStatus::Skipped);
    let error = report.error.clone().unwrap();
    assert!(error.starts_with("Timed out waiting for detail fields after reload"), "{error}");
    assert_eq!(page.reloads(DETAIL), 1);
    assert_eq!(
        report.artifacts,
        vec![dir.path().join("never_loads").join("screenshot.png")]
    );
}

#[tokio::test(start_paused = true)]
async fn test_detail_verification_rerun_is_idempotent() {
    let config = ProbeConfig::default();
    let page = back_office(true, Readiness::AfterReload);

    let first = OrderScenario::new(&config).run(&page).await;
    assert!(first.passed, "{:?}", first.error);

    let rerun = OrderScenario::new(&config)
        .with_steps([Step::VerifyOrderDetail, Step::VerifyLineItems])
        .run(&page)
        .await;

    assert!(rerun.passed, "{:?}", rerun.error);
    let detail = outcome(&rerun, Step::VerifyOrderDetail);
    assert_eq!(detail["reloaded"], json!(false));
    assert_eq!(detail["first_wait_attempts"], json!(1));
    assert_eq!(page.reloads(DETAIL), 1, "no second reload");
}

#[tokio::test(start_paused = true)]
async fn test_line_item_count_is_exact() {
    let mut config = ProbeConfig::default();
    config.case.line_items = 2;
    let page = back_office(true, Readiness::Immediate);

    let report = OrderScenario::new(&config).run(&page).await;

    assert_eq!(report.failed_step(), Some(Step::VerifyLineItems));
    let error = report.error.unwrap();
    assert!(error.contains("line item rows"), "{error}");
    assert!(error.contains("expected \"2\""), "{error}");
}

#[tokio::test(start_paused = true)]
async fn test_wrong_status_fails_in_the_list() {
    let mut config = ProbeConfig::default();
    config.case.status = "已驳回".to_string();
    let page = back_office(true, Readiness::Immediate);

    let report = OrderScenario::new(&config).run(&page).await;

    assert_eq!(report.failed_step(), Some(Step::VerifyOrderList));
    assert!(report.error.unwrap().contains("Assertion failed for status"));
}
