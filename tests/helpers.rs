use std::sync::Arc;
use std::thread;

use serde_json::{json, Value};
use tinybars::context::display;
use tinybars::{Config, Engine, HelperValue, RenderError, SafeString};

fn link_helper(engine: &Engine, name: &str) {
    engine.register_helper(name, |out, _, args| {
        out.write_safe(&format!(
            "<a href='{}'>{}</a>",
            display(&args[0]),
            display(&args[1])
        ))?;
        Ok(HelperValue::Nothing)
    });
}

#[test]
fn helper_writes_safe_output() {
    let engine = Engine::new();
    link_helper(&engine, "link_to");
    let template = engine.compile("Click here: {{link_to url text}}").unwrap();
    let data = json!({"url": "https://example.com/repo", "text": "Repo"});
    assert_eq!(
        template.render(&data).unwrap(),
        "Click here: <a href='https://example.com/repo'>Repo</a>"
    );
}

#[test]
fn helper_registered_after_compile_is_visible() {
    let engine = Engine::new();
    let template = engine
        .compile("Click here: {{link_to_post_reg url text}}")
        .unwrap();
    link_helper(&engine, "link_to_post_reg");
    let data = json!({"url": "https://example.com/repo", "text": "Repo"});
    assert_eq!(
        template.render(&data).unwrap(),
        "Click here: <a href='https://example.com/repo'>Repo</a>"
    );
}

#[test]
fn returned_values_follow_delimiter_escaping() {
    let engine = Engine::new();
    engine.register_helper("wrap", |_, _, args| {
        Ok(Value::String(format!("<{}>", display(&args[0]))).into())
    });
    engine.register_helper("safe", |_, _, args| {
        Ok(SafeString(format!("<{}>", display(&args[0]))).into())
    });
    let data = json!({"x": "b"});

    let escaped = engine.compile("{{wrap x}}|{{{wrap x}}}|{{safe x}}").unwrap();
    assert_eq!(escaped.render(&data).unwrap(), "&lt;b&gt;|<b>|<b>");
}

#[test]
fn helpers_receive_literals_and_missing_as_null() {
    let engine = Engine::new();
    engine.register_helper("dump", |_, _, args| {
        Ok(Value::String(Value::Array(args.to_vec()).to_string()).into())
    });
    let template = engine.compile(r#"{{{dump "s" 1 -2.5 true null gone}}}"#).unwrap();
    assert_eq!(
        template.render(&json!({})).unwrap(),
        r#"["s",1,-2.5,true,null,null]"#
    );
}

#[test]
fn helpers_see_the_current_scope() {
    let engine = Engine::new();
    engine.register_helper("here", |_, scope, _| {
        Ok(scope.value().get("name").cloned().unwrap_or(Value::Null).into())
    });
    let template = engine.compile("{{#each people}}{{here 0}} {{/each}}").unwrap();
    let data = json!({"people": [{"name": "a"}, {"name": "b"}]});
    assert_eq!(template.render(&data).unwrap(), "a b ");
}

#[test]
fn helpers_can_walk_the_scope_chain() {
    let engine = Engine::new();
    engine.register_helper("where", |_, scope, _| {
        let position = match (scope.key(), scope.index()) {
            (Some(key), _) => key.to_string(),
            (None, Some(index)) => index.to_string(),
            (None, None) => "-".to_string(),
        };
        let parent = scope
            .parent()
            .map(|parent| display(&parent.value()["title"]).into_owned())
            .unwrap_or_default();
        let root = display(&scope.root_value()["title"]).into_owned();
        Ok(Value::String(format!("{position}@{parent}/{root}")).into())
    });
    let template = engine
        .compile("{{#each xs}}{{where .}} {{/each}}{{#each m}}{{where .}} {{/each}}{{where .}}")
        .unwrap();
    let data = json!({"title": "T", "xs": ["a", "b"], "m": {"k": 1}});
    assert_eq!(template.render(&data).unwrap(), "0@T/T 1@T/T k@T/T -@/T");
}

#[test]
fn last_registered_helper_wins() {
    let engine = Engine::new();
    let template = engine.compile("{{h 1}}").unwrap();
    engine.register_helper("h", |_, _, _| Ok(Value::from("a").into()));
    assert_eq!(template.render(&json!({})).unwrap(), "a");

    engine.register_helper("h", |_, _, _| Ok(Value::from("b").into()));
    assert_eq!(template.render(&json!({})).unwrap(), "b");
    assert_eq!(engine.compile("{{h 2}}").unwrap().render(&json!({})).unwrap(), "b");
}

#[test]
fn helper_errors_propagate() {
    let engine = Engine::new();
    engine.register_helper("fail", |_, _, _| Err(RenderError::helper("fail", "on purpose")));
    let template = engine.compile("x{{fail 1}}").unwrap();
    let err = template.render(&json!({})).unwrap_err();
    assert_eq!(err.to_string(), "helper `fail` failed: on purpose");
}

#[test]
fn block_helpers() {
    let engine = Engine::new();
    engine.register_block_helper("repeat", |out, scope, args, body| {
        let times = args[0].as_u64().unwrap_or(0);
        if times == 0 {
            return body.render_inverse(out, scope);
        }
        for i in 0..times {
            body.render_with(out, scope, &json!({ "n": i }))?;
        }
        Ok(())
    });
    let template = engine
        .compile("{{#repeat count}}[{{n}}{{../label}}]{{else}}none{{/repeat}}")
        .unwrap();
    assert_eq!(
        template.render(&json!({"count": 3, "label": "!"})).unwrap(),
        "[0!][1!][2!]"
    );
    assert_eq!(template.render(&json!({"count": 0})).unwrap(), "none");
}

#[test]
fn block_helpers_can_ask_for_an_else_branch() {
    let engine = Engine::new();
    engine.register_block_helper("either", |out, _, _, body| {
        out.write_safe(if body.has_inverse() { "two" } else { "one" })
    });
    let template = engine
        .compile("{{#either 1}}a{{/either}} {{#either 1}}a{{else}}b{{/either}}")
        .unwrap();
    assert_eq!(template.render(&json!({})).unwrap(), "one two");
}

#[test]
fn registered_block_helper_takes_over_a_section() {
    let engine = Engine::new();
    let template = engine.compile("{{#loud}}hi {{name}}{{/loud}}").unwrap();
    let data = json!({"name": "sam", "loud": {"name": "sam"}});
    assert_eq!(template.render(&data).unwrap(), "hi sam");

    engine.register_block_helper("loud", |out, scope, _, body| {
        let mut inner = String::new();
        body.render(&mut tinybars::Output::new(&mut inner, true), scope)?;
        out.write_safe(&inner.to_uppercase())
    });
    assert_eq!(template.render(&data).unwrap(), "HI SAM");
}

#[test]
fn missing_block_helper_is_a_render_error() {
    let template = Engine::new().compile("{{#fancy a}}x{{/fancy}}").unwrap();
    assert!(matches!(
        template.render(&json!({})),
        Err(RenderError::MissingHelper(_))
    ));
}

// ── Partials ──

#[test]
fn partials_render_inline() {
    let engine = Engine::new();
    let page = engine
        .compile("<ul>{{#each people}}{{> item}}{{/each}}</ul>")
        .unwrap();
    engine.register_partial_source("item", "<li>{{name}}</li>").unwrap();
    let data = json!({"people": [{"name": "a"}, {"name": "b"}]});
    assert_eq!(page.render(&data).unwrap(), "<ul><li>a</li><li>b</li></ul>");
}

#[test]
fn partial_with_explicit_context() {
    let engine = Engine::new();
    let card = engine.compile("{{name}} of {{@root.team}}").unwrap();
    engine.register_partial("card", &card);
    let template = engine.compile("{{> card lead}}").unwrap();
    let data = json!({"team": "core", "lead": {"name": "Kim"}});
    assert_eq!(template.render(&data).unwrap(), "Kim of core");
}

#[test]
fn last_registered_partial_wins() {
    let engine = Engine::new();
    let page = engine.compile("[{{> p}}]").unwrap();
    engine.register_partial_source("p", "first {{x}}").unwrap();
    assert_eq!(page.render(&json!({"x": 1})).unwrap(), "[first 1]");

    engine.register_partial_source("p", "second {{x}}").unwrap();
    assert_eq!(page.render(&json!({"x": 1})).unwrap(), "[second 1]");
}

#[test]
fn missing_partial_is_a_render_error() {
    let template = Engine::new().compile("a{{> nowhere}}").unwrap();
    assert!(matches!(
        template.render(&json!({})),
        Err(RenderError::MissingPartial(name)) if name == "nowhere"
    ));
}

#[test]
fn recursive_partials_are_bounded() {
    let engine = Engine::with_config(Config {
        max_partial_depth: 8,
        ..Config::default()
    });
    engine.register_partial_source("self", "x{{> self}}").unwrap();
    let template = engine.compile("{{> self}}").unwrap();
    assert!(matches!(
        template.render(&json!({})),
        Err(RenderError::PartialDepth(_, 8))
    ));

    engine
        .register_partial_source("tree", "{{name}}({{#each kids}}{{> tree}}{{/each}})")
        .unwrap();
    let tree = engine.compile("{{> tree}}").unwrap();
    let data = json!({"name": "a", "kids": [{"name": "b", "kids": []}, {"name": "c"}]});
    assert_eq!(tree.render(&data).unwrap(), "a(b()c())");
}

// ── Configuration and sharing ──

#[test]
fn escaping_can_be_disabled() {
    let engine = Engine::with_config(Config {
        escape_html: false,
        ..Config::default()
    });
    let template = engine.compile("{{x}}").unwrap();
    assert_eq!(template.render(&json!({"x": "<i>"})).unwrap(), "<i>");
}

#[test]
fn concurrent_renders_share_one_template() {
    let engine = Engine::new();
    engine.register_helper("double", |_, _, args| {
        Ok(Value::from(args[0].as_i64().unwrap_or(0) * 2).into())
    });
    let template = Arc::new(engine.compile("{{#each xs}}{{double this}};{{/each}}").unwrap());

    let handles: Vec<_> = (0..8i64)
        .map(|t| {
            let template = Arc::clone(&template);
            thread::spawn(move || {
                let data = json!({"xs": [t, t + 1]});
                template.render(&data).unwrap()
            })
        })
        .collect();

    for (t, handle) in handles.into_iter().enumerate() {
        let t = t as i64;
        assert_eq!(handle.join().unwrap(), format!("{};{};", t * 2, (t + 1) * 2));
    }
}
