use gles_harness::gpu::{BufferTarget, Command, ErrorCode, PrimitiveKind};
use gles_harness::{
    build_renderer, run_headless, GeometryBuffer, GraphicsContext, HarnessConfig, HarnessError,
    HeadlessContext, RenderConfig, ShaderProgramBuilder, ShaderSources, ShaderStage, SymbolKind,
    FRAGMENT_SHADER_SOURCE, VERTEX_SHADER_SOURCE,
};

fn headless() -> HeadlessContext {
    let config = HarnessConfig::default();
    assert!(!config.surface.fullscreen);
    HeadlessContext::new(config.surface.width, config.surface.height)
}

#[test]
fn one_frame_draws_one_triangle_in_order() {
    let mut ctx = headless();
    let mut renderer =
        build_renderer(&mut ctx, &ShaderSources::builtin(), &RenderConfig::default()).unwrap();
    let program = renderer.program();
    let position = program.resolve_attribute_location("aVertexPosition").unwrap();
    let color = program.resolve_attribute_location("aVertexColor").unwrap();
    let projection = program.resolve_uniform_location("uPMatrix").unwrap();
    let model_view = program.resolve_uniform_location("uMVMatrix").unwrap();
    ctx.take_commands();

    let report = renderer.render_frame(&mut ctx, 16.0);
    assert!(report.is_clean(), "{:?}", report.errors);

    let commands = ctx.take_commands();
    let draws: Vec<_> = commands
        .iter()
        .enumerate()
        .filter(|(_, command)| matches!(command, Command::Draw { .. }))
        .collect();
    assert_eq!(draws.len(), 1);
    let (draw_index, draw) = draws[0];
    assert_eq!(
        *draw,
        Command::Draw {
            kind: PrimitiveKind::Triangles,
            first: 0,
            count: 3,
        }
    );

    let before_draw: Vec<&Command> = commands[..draw_index]
        .iter()
        .filter(|command| {
            matches!(
                command,
                Command::AttributePointer { .. } | Command::UploadMatrix { .. }
            )
        })
        .collect();
    assert_eq!(before_draw.len(), 4);
    assert!(matches!(
        before_draw[0],
        Command::AttributePointer { location, components: 3, .. } if *location == position
    ));
    assert!(matches!(
        before_draw[1],
        Command::AttributePointer { location, components: 4, .. } if *location == color
    ));
    assert!(matches!(
        before_draw[2],
        Command::UploadMatrix { location, .. } if *location == projection
    ));
    assert!(matches!(
        before_draw[3],
        Command::UploadMatrix { location, .. } if *location == model_view
    ));

    assert_eq!(
        commands.last(),
        Some(&Command::BindBuffer(BufferTarget::Array, None))
    );
}

#[test]
fn every_frame_redraws_the_same_triangle() {
    let mut ctx = headless();
    let mut renderer =
        build_renderer(&mut ctx, &ShaderSources::builtin(), &RenderConfig::default()).unwrap();

    for _ in 0..3 {
        ctx.take_commands();
        let report = renderer.render_frame(&mut ctx, 500.0);
        assert_eq!(report.draws, 1);
        ctx.present_frame().unwrap();
    }
    assert_eq!(renderer.angle(), 135.0);
    assert_eq!(ctx.frames_presented(), 3);
    assert_eq!(ctx.get_error(), ErrorCode::NoError);
}

#[test]
fn undeclared_uniform_is_reported_by_name() {
    let mut ctx = headless();
    let renderer =
        build_renderer(&mut ctx, &ShaderSources::builtin(), &RenderConfig::default()).unwrap();

    let err = renderer
        .program()
        .resolve_uniform_location("uDoesNotExist")
        .unwrap_err();
    assert_eq!(err.kind, SymbolKind::Uniform);
    assert!(err.to_string().contains("uDoesNotExist"));
}

#[test]
fn shader_missing_required_attribute_aborts_startup() {
    let vertex = "
        @group(0) @binding(0) var<uniform> uPMatrix: mat4x4<f32>;
        @group(0) @binding(1) var<uniform> uMVMatrix: mat4x4<f32>;

        struct VertexOutput {
            @builtin(position) position: vec4<f32>,
            @location(0) vColor: vec4<f32>,
        };

        @vertex
        fn vertex_main(@location(0) aVertexPosition: vec3<f32>) -> VertexOutput {
            var out: VertexOutput;
            out.position = uPMatrix * uMVMatrix * vec4<f32>(aVertexPosition, 1.0);
            out.vColor = vec4<f32>(1.0, 1.0, 1.0, 1.0);
            return out;
        }
    ";
    let mut ctx = headless();
    let sources = ShaderSources::new(vertex, FRAGMENT_SHADER_SOURCE);
    let err = build_renderer(&mut ctx, &sources, &RenderConfig::default()).unwrap_err();

    match err {
        HarnessError::SymbolNotFound(missing) => {
            assert_eq!(missing.kind, SymbolKind::Attribute);
            assert_eq!(missing.name, "aVertexColor");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn invalid_vertex_shader_stops_before_linking() {
    let mut ctx = headless();
    let mut builder = ShaderProgramBuilder::new();

    let err = builder
        .compile_shader(ShaderStage::Vertex, "@vertex fn vertex_main( {")
        .unwrap_err();
    assert_eq!(err.stage, ShaderStage::Vertex);
    assert!(!err.log.is_empty());

    let sources = ShaderSources::new("@vertex fn vertex_main( {", FRAGMENT_SHADER_SOURCE);
    assert!(matches!(
        build_renderer(&mut ctx, &sources, &RenderConfig::default()),
        Err(HarnessError::ShaderCompile(_))
    ));
    assert!(ctx
        .commands()
        .iter()
        .all(|command| !matches!(command, Command::LinkProgram(_))));
}

#[test]
fn mismatched_buffer_is_rejected_without_allocation() {
    let mut ctx = headless();
    let err = GeometryBuffer::create(&mut ctx, 4, 3, &[0.0; 9]).unwrap_err();

    assert!(matches!(err, HarnessError::BufferSizeMismatch(_)));
    assert!(ctx.commands().is_empty());
}

#[test]
fn builtin_sources_are_the_embedded_stages() {
    let sources = ShaderSources::builtin();
    assert_eq!(sources.vertex, VERTEX_SHADER_SOURCE);
    assert_eq!(sources.fragment, FRAGMENT_SHADER_SOURCE);
}

#[test]
fn headless_loop_runs_and_tears_down() {
    let render = RenderConfig {
        frame_cap_hz: None,
        ..RenderConfig::default()
    };
    let config = HarnessConfig::default().with_render(render);

    let presented = run_headless(config, ShaderSources::builtin(), Some(5)).unwrap();
    assert_eq!(presented, 5);
}
