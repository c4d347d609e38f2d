use std::{num::NonZeroUsize, sync::Arc};

use figrender::application::render::{
    RenderDispatcher, RenderRequest, ScriptOptions, ToolchainOptions,
};
use futures::future::join_all;

fn dispatcher(max_concurrent: usize) -> RenderDispatcher {
    RenderDispatcher::new(
        ScriptOptions {
            dpi: 50.0,
            ..ScriptOptions::default()
        },
        ToolchainOptions::default(),
        NonZeroUsize::new(max_concurrent).expect("non-zero"),
    )
}

fn drawing(index: usize) -> String {
    format!(
        r#"
fn draw(fig, ax) {{
    let xs = np::linspace(0.0, 1.0, 20);
    let ys = [];
    for x in xs {{ ys.push(x * {slope}.0); }}
    ax.plot(xs, ys, #{{ color: plt::cycle({index}) }});
    ax.set_title("figure {index}");
    ax.set_ylim(0.0, 10.0);
}}
"#,
        slope = index + 1,
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_script_renders_do_not_share_state() {
    let count = 6;
    let sequential = dispatcher(1);
    let mut expected = Vec::with_capacity(count);
    for index in 0..count {
        let result = sequential
            .dispatch(&RenderRequest::script(drawing(index)))
            .await;
        assert!(result.success(), "error: {:?}", result.error());
        expected.push(result.into_image().expect("image"));
    }

    for (index, image) in expected.iter().enumerate().skip(1) {
        assert_ne!(image, &expected[0], "figure {index} matches figure 0");
    }

    let concurrent = Arc::new(dispatcher(count));
    let tasks = (0..count).map(|index| {
        let dispatcher = Arc::clone(&concurrent);
        tokio::spawn(async move {
            dispatcher
                .dispatch(&RenderRequest::script(drawing(index)))
                .await
        })
    });

    for (index, joined) in join_all(tasks).await.into_iter().enumerate() {
        let result = joined.expect("render task");
        assert!(result.success(), "error: {:?}", result.error());
        assert_eq!(
            result.image(),
            Some(expected[index].as_slice()),
            "figure {index} differs from its sequential render"
        );
    }
}
