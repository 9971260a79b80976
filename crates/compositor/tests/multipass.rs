mod common;

use common::{count, draws, CollectingSink, Event, ScriptedBackend, FAIL_MARKER};
use compositor::{
    Compositor, PassConfig, PassKey, RenderFault, Sketch, UniformDecl, UniformValue,
};

fn sketch(entries: &[(PassKey, &str)]) -> Sketch {
    let mut sketch = Sketch::default();
    for &(key, source) in entries {
        sketch.set(key, Some(PassConfig::new(source)));
    }
    sketch
}

#[test]
fn renders_dependencies_before_dependents() {
    common::init_logging();
    let backend = ScriptedBackend::new();
    let events = backend.events.clone();
    let mut compositor = Compositor::new(
        backend,
        sketch(&[
            (PassKey::Image, "gl_FragColor = texture2D(BufferA, uv);"),
            (PassKey::BufferA, "gl_FragColor = vec4(1.0);"),
        ]),
        (640, 480),
    );

    assert_eq!(compositor.render_order(), &[PassKey::BufferA, PassKey::Image]);
    assert!(compositor.is_ready());

    compositor.render(Some(1.0));
    let draws = draws(&events);
    assert_eq!(draws.len(), 2);
    assert!(draws[0].1.is_some(), "buffer pass draws offscreen first");
    assert!(draws[1].1.is_none(), "image pass draws to the surface last");
}

#[test]
fn binds_dependency_textures_to_sequential_units() {
    let backend = ScriptedBackend::new();
    let events = backend.events.clone();
    let mut compositor = Compositor::new(
        backend,
        sketch(&[
            (PassKey::Image, "mix(texture2D(BufferA, uv), texture2D(BufferB, uv), 0.5)"),
            (PassKey::BufferA, "gl_FragColor = vec4(1.0);"),
            (PassKey::BufferB, "gl_FragColor = vec4(0.0);"),
        ]),
        (640, 480),
    );

    compositor.render(Some(0.0));
    let binds: Vec<(u32, String)> = events
        .borrow()
        .iter()
        .filter_map(|event| match event {
            Event::BindTexture { unit, sampler, .. } => Some((*unit, sampler.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        binds,
        vec![(0, "BufferA".to_string()), (1, "BufferB".to_string())]
    );
}

#[test]
fn self_reference_binds_own_previous_frame() {
    let backend = ScriptedBackend::new();
    let events = backend.events.clone();
    let mut compositor = Compositor::new(
        backend,
        sketch(&[
            (PassKey::Image, "gl_FragColor = vec4(1.0);"),
            (PassKey::BufferA, "gl_FragColor = texture2D(BufferA, uv);"),
        ]),
        (640, 480),
    );

    // Image carries no dependency, so declaration order wins the tie-break.
    assert_eq!(compositor.render_order(), &[PassKey::Image, PassKey::BufferA]);

    compositor.render(Some(0.0));
    let own_target = events
        .borrow()
        .iter()
        .find_map(|event| match event {
            Event::CreateTarget { target } => Some(*target),
            _ => None,
        })
        .unwrap();
    let bind = events
        .borrow()
        .iter()
        .find_map(|event| match event {
            Event::BindTexture { unit, target, sampler, .. } => {
                Some((*unit, *target, sampler.clone()))
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(bind, (0, own_target, "BufferA".to_string()));
}

#[test]
fn value_only_update_touches_no_resources() {
    let backend = ScriptedBackend::new();
    let events = backend.events.clone();
    let base = {
        let mut s = Sketch::default();
        s.set(
            PassKey::Image,
            Some(PassConfig::with_uniforms(
                "gl_FragColor = vec4(vec3(speed), 1.0);",
                vec![UniformDecl::new("speed", UniformValue::Float(1.0))],
            )),
        );
        s.set(PassKey::BufferA, Some(PassConfig::new("gl_FragColor = vec4(0.0);")));
        s
    };
    let mut compositor = Compositor::new(backend, base.clone(), (640, 480));
    events.borrow_mut().clear();

    let mut next = base;
    next.set(
        PassKey::Image,
        Some(PassConfig::with_uniforms(
            "gl_FragColor = vec4(vec3(speed), 1.0);",
            vec![UniformDecl::new("speed", UniformValue::Float(4.0))],
        )),
    );
    compositor.update(next);

    assert_eq!(count(&events, |e| matches!(e, Event::Compile { .. })), 0);
    assert_eq!(count(&events, |e| matches!(e, Event::CreateTarget { .. })), 0);
    assert_eq!(count(&events, |e| matches!(e, Event::DestroyProgram { .. })), 0);
    assert_eq!(count(&events, |e| matches!(e, Event::DestroyTarget { .. })), 0);

    compositor.render(Some(0.0));
    assert!(events.borrow().iter().any(|event| matches!(
        event,
        Event::SetUniform { name, value: UniformValue::Float(v), .. }
            if name == "speed" && *v == 4.0
    )));
}

#[test]
fn identical_update_is_idempotent() {
    let backend = ScriptedBackend::new();
    let events = backend.events.clone();
    let base = sketch(&[
        (PassKey::Image, "gl_FragColor = texture2D(BufferA, uv);"),
        (PassKey::BufferA, "gl_FragColor = vec4(1.0);"),
    ]);
    let mut compositor = Compositor::new(backend, base.clone(), (640, 480));
    events.borrow_mut().clear();

    compositor.update(base.clone());
    compositor.update(base);

    assert_eq!(count(&events, |e| matches!(e, Event::Compile { .. })), 0);
    assert_eq!(count(&events, |e| matches!(e, Event::DestroyProgram { .. })), 0);
}

#[test]
fn structural_update_releases_everything_before_recreating() {
    let backend = ScriptedBackend::new();
    let events = backend.events.clone();
    let base = sketch(&[
        (PassKey::Image, "gl_FragColor = texture2D(BufferA, uv);"),
        (PassKey::BufferA, "gl_FragColor = vec4(1.0);"),
    ]);
    let mut compositor = Compositor::new(backend, base.clone(), (640, 480));
    events.borrow_mut().clear();

    let mut next = base;
    next.set(
        PassKey::Image,
        Some(PassConfig::new("gl_FragColor = texture2D(BufferA, uv) * 0.5;")),
    );
    compositor.update(next);

    assert_eq!(count(&events, |e| matches!(e, Event::DestroyProgram { .. })), 2);
    assert_eq!(count(&events, |e| matches!(e, Event::DestroyTarget { .. })), 1);
    assert_eq!(count(&events, |e| matches!(e, Event::Compile { .. })), 2);
    assert_eq!(count(&events, |e| matches!(e, Event::CreateTarget { .. })), 1);

    let log = events.borrow();
    let last_release = log
        .iter()
        .rposition(|e| matches!(e, Event::DestroyProgram { .. } | Event::DestroyTarget { .. }))
        .unwrap();
    let first_create = log
        .iter()
        .position(|e| matches!(e, Event::Compile { .. } | Event::CreateTarget { .. }))
        .unwrap();
    assert!(
        last_release < first_create,
        "all old resources release before any new one is created"
    );
}

#[test]
fn compile_failure_is_isolated_to_the_failing_pass() {
    let backend = ScriptedBackend::new();
    let events = backend.events.clone();
    let (sink, faults) = CollectingSink::new();
    let mut compositor = Compositor::with_sink(
        backend,
        sketch(&[
            (PassKey::Image, "gl_FragColor = vec4(1.0);"),
            (PassKey::BufferA, FAIL_MARKER),
            (PassKey::BufferB, "gl_FragColor = texture2D(BufferA, uv);"),
        ]),
        (640, 480),
        Box::new(sink),
    );

    assert!(faults.borrow().iter().any(|fault| matches!(
        fault,
        RenderFault::Compile { pass: PassKey::BufferA, .. }
    )));

    compositor.render(Some(0.0));
    // Image still renders to the surface.
    assert!(draws(&events).iter().any(|(_, target)| target.is_none()));
    // BufferB renders with its dependency's texture unit left unbound.
    assert_eq!(count(&events, |e| matches!(e, Event::BindTexture { .. })), 0);
    assert_eq!(draws(&events).len(), 2);
}

#[test]
fn image_compile_failure_leaves_compositor_skipping_frames() {
    let backend = ScriptedBackend::new();
    let events = backend.events.clone();
    let mut compositor =
        Compositor::new(backend, sketch(&[(PassKey::Image, FAIL_MARKER)]), (640, 480));

    assert!(!compositor.is_ready());
    compositor.render(Some(0.0));
    compositor.render(Some(1.0));
    assert!(draws(&events).is_empty());

    // A further successful update recovers.
    compositor.update(sketch(&[(PassKey::Image, "gl_FragColor = vec4(1.0);")]));
    assert!(compositor.is_ready());
    compositor.render(Some(2.0));
    assert_eq!(draws(&events).len(), 1);
}

#[test]
fn resize_updates_viewport_without_rebuilding() {
    let backend = ScriptedBackend::new();
    let events = backend.events.clone();
    let mut compositor = Compositor::new(
        backend,
        sketch(&[
            (PassKey::Image, "gl_FragColor = texture2D(BufferA, uv);"),
            (PassKey::BufferA, "gl_FragColor = vec4(1.0);"),
        ]),
        (640, 480),
    );
    events.borrow_mut().clear();

    compositor.resize(1024, 768);
    assert_eq!(
        events.borrow().as_slice(),
        &[Event::Viewport { width: 1024, height: 768 }]
    );

    compositor.render(Some(0.0));
    assert!(events.borrow().iter().any(|event| matches!(
        event,
        Event::SetUniform { name, value: UniformValue::Vec2(v), .. }
            if name == "resolution" && *v == [1024.0, 768.0]
    )));
}

#[test]
fn stream_defaults_to_time_until_supplied() {
    let backend = ScriptedBackend::new();
    let events = backend.events.clone();
    let mut compositor = Compositor::new(
        backend,
        sketch(&[(PassKey::Image, "gl_FragColor = vec4(vec3(stream), 1.0);")]),
        (640, 480),
    );

    compositor.render(Some(2.5));
    assert!(events.borrow().iter().any(|event| matches!(
        event,
        Event::SetUniform { name, value: UniformValue::Float(v), .. }
            if name == "stream" && *v == 2.5
    )));

    events.borrow_mut().clear();
    compositor.set_stream(Some(7.0));
    compositor.set_volume(0.25);
    compositor.render(Some(3.0));
    let log = events.borrow();
    assert!(log.iter().any(|event| matches!(
        event,
        Event::SetUniform { name, value: UniformValue::Float(v), .. }
            if name == "stream" && *v == 7.0
    )));
    assert!(log.iter().any(|event| matches!(
        event,
        Event::SetUniform { name, value: UniformValue::Float(v), .. }
            if name == "time" && *v == 3.0
    )));
    assert!(log.iter().any(|event| matches!(
        event,
        Event::SetUniform { name, value: UniformValue::Float(v), .. }
            if name == "volume" && *v == 0.25
    )));
}

#[test]
fn live_uniform_edits_feed_the_next_frame() {
    let backend = ScriptedBackend::new();
    let events = backend.events.clone();
    let mut sketch = Sketch::default();
    sketch.set(
        PassKey::Image,
        Some(PassConfig::with_uniforms(
            "gl_FragColor = vec4(vec3(speed), 1.0);",
            vec![UniformDecl::new("speed", UniformValue::Float(1.0))],
        )),
    );
    let mut compositor = Compositor::new(backend, sketch, (640, 480));

    assert!(compositor.set_uniform_value(PassKey::Image, "speed", UniformValue::Float(8.0)));
    assert!(!compositor.set_uniform_value(PassKey::Image, "unknown", UniformValue::Float(0.0)));
    assert!(!compositor.set_uniform_value(PassKey::BufferD, "speed", UniformValue::Float(0.0)));

    compositor.render(Some(0.0));
    assert!(events.borrow().iter().any(|event| matches!(
        event,
        Event::SetUniform { name, value: UniformValue::Float(v), .. }
            if name == "speed" && *v == 8.0
    )));
}

#[test]
fn rejected_uniform_values_surface_as_faults() {
    let backend = ScriptedBackend::rejecting("speed");
    let (sink, faults) = CollectingSink::new();
    let mut sketch = Sketch::default();
    sketch.set(
        PassKey::Image,
        Some(PassConfig::with_uniforms(
            "gl_FragColor = vec4(vec3(speed), 1.0);",
            vec![UniformDecl::new("speed", UniformValue::Float(1.0))],
        )),
    );
    let mut compositor = Compositor::with_sink(backend, sketch, (640, 480), Box::new(sink));

    compositor.render(Some(0.0));
    assert!(faults.borrow().iter().any(|fault| matches!(
        fault,
        RenderFault::UniformSet { pass: PassKey::Image, name } if name == "speed"
    )));
}

#[test]
fn destroy_releases_each_resource_exactly_once() {
    let backend = ScriptedBackend::new();
    let events = backend.events.clone();
    let mut compositor = Compositor::new(
        backend,
        sketch(&[
            (PassKey::Image, "gl_FragColor = texture2D(BufferA, uv);"),
            (PassKey::BufferA, "gl_FragColor = vec4(1.0);"),
        ]),
        (640, 480),
    );
    events.borrow_mut().clear();

    compositor.destroy();
    assert_eq!(count(&events, |e| matches!(e, Event::DestroyProgram { .. })), 2);
    assert_eq!(count(&events, |e| matches!(e, Event::DestroyTarget { .. })), 1);

    compositor.render(Some(0.0));
    assert!(draws(&events).is_empty());

    // Dropping after an explicit destroy must not double-release.
    drop(compositor);
    assert_eq!(count(&events, |e| matches!(e, Event::DestroyProgram { .. })), 2);
    assert_eq!(count(&events, |e| matches!(e, Event::DestroyTarget { .. })), 1);
}

#[test]
fn surface_loss_is_reported_to_the_sink() {
    let backend = ScriptedBackend::new();
    let (sink, faults) = CollectingSink::new();
    let mut compositor = Compositor::with_sink(
        backend,
        sketch(&[(PassKey::Image, "gl_FragColor = vec4(1.0);")]),
        (640, 480),
        Box::new(sink),
    );

    compositor.surface_lost();
    assert!(faults
        .borrow()
        .iter()
        .any(|fault| matches!(fault, RenderFault::SurfaceLost)));
}
