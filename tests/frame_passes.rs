//! Ordering of the shadowed frame on the tracking backend.

use lumen::gpu::{GpuEvent, Primitive};
use lumen::shader::names;
use lumen::{
    AntiAliasing, Camera, Cube, DirectLight, FrameShaders, GpuDevice, Model3D, Plane, Renderer,
    RendererError, RenderTarget, Scene, Shader, ShadowPass, TrackingGpu,
};
use lumen::glam::Vec3;

struct Fixture {
    device: GpuDevice,
    gpu: TrackingGpu,
    renderer: Renderer,
    models: Vec<Model3D>,
    lighting: Shader,
    shadow: Shader,
    sun: DirectLight,
    camera: Camera,
}

fn fixture() -> Fixture {
    let (device, gpu) = GpuDevice::tracking();
    let mut renderer = Renderer::new(&device);
    renderer.resize(64, 48);

    let mut cube = renderer.prepare_model(Cube::new().into()).unwrap();
    cube.set_position(Vec3::new(0.0, 1.0, 0.0));
    let mut floor = renderer.prepare_model(Plane::new(4, 4).into()).unwrap();
    floor.set_scale_factor(10.0);

    let mut lighting = Shader::new(&device);
    lighting.use_program(names::BLINN_PHONG).unwrap();
    let mut shadow = Shader::new(&device);
    shadow.use_program(names::SHADOW_MAP).unwrap();

    let mut sun = DirectLight::new(
        Vec3::splat(1.4),
        Vec3::splat(1.4),
        Vec3::splat(1.4),
        Vec3::new(245.0, 300.0, 170.0),
    );
    sun.set_projection(64.0 / 4.0, 48.0 / 4.0, 0.1, 1000.0);
    sun.init_shadow_map(&device, 128, 128).unwrap();

    let mut camera = Camera::perspective(64, 48, 45.0, 0.1, 1000.0);
    camera.look_at(Vec3::new(15.0, 10.0, 15.0), Vec3::ZERO);

    Fixture {
        device,
        gpu,
        renderer,
        models: vec![cube, floor],
        lighting,
        shadow,
        sun,
        camera,
    }
}

impl Fixture {
    fn frame(&mut self, target: &dyn RenderTarget, bounding_boxes: bool) -> Result<(), RendererError> {
        let models: Vec<&Model3D> = self.models.iter().collect();
        let scene = Scene {
            models: &models,
            point_lights: &[],
            spot_lights: &[],
        };
        let shaders = FrameShaders {
            lighting: &self.lighting,
            shadow: &self.shadow,
        };
        self.renderer.render_shadowed_frame(
            &scene,
            &self.camera,
            &self.sun,
            &shaders,
            0.2,
            target,
            bounding_boxes,
        )
    }
}

fn first_write(events: &[GpuEvent], framebuffer: Option<lumen::gpu::FramebufferId>) -> usize {
    events
        .iter()
        .position(|e| e.written_framebuffer() == Some(framebuffer))
        .unwrap()
}

fn last_write(events: &[GpuEvent], framebuffer: Option<lumen::gpu::FramebufferId>) -> usize {
    events
        .iter()
        .rposition(|e| e.written_framebuffer() == Some(framebuffer))
        .unwrap()
}

#[test]
fn test_shadow_pass_finishes_before_main_pass() {
    let mut f = fixture();
    let target = AntiAliasing::None.build(&f.device, 64, 48).unwrap();
    f.gpu.clear_events();

    f.frame(target.as_ref(), false).unwrap();

    let events = f.gpu.events();
    let shadow_fb = Some(f.sun.shadow_map().unwrap().target().framebuffer());
    let main_fb = Some(target.framebuffer());
    assert!(last_write(&events, shadow_fb) < first_write(&events, main_fb));
    assert!(last_write(&events, main_fb) < first_write(&events, None));
    assert!(f.gpu.violations().is_empty());
}

#[test]
fn test_passes_write_only_their_own_target() {
    let mut f = fixture();
    let target = AntiAliasing::None.build(&f.device, 64, 48).unwrap();
    let depth = f.sun.shadow_map().unwrap().depth_texture();
    f.gpu.clear_events();

    f.frame(target.as_ref(), false).unwrap();

    let shadow_fb = Some(f.sun.shadow_map().unwrap().target().framebuffer());
    let main_fb = Some(target.framebuffer());
    let draws: Vec<_> = f
        .gpu
        .events()
        .into_iter()
        .filter_map(|e| match e {
            GpuEvent::Draw {
                framebuffer,
                textures,
                ..
            } => Some((framebuffer, textures)),
            _ => None,
        })
        .collect();

    // one draw per model and pass, the cube and plane each have one material
    assert_eq!(draws.len(), 4);
    let (shadow, main) = draws.split_at(2);
    assert!(shadow
        .iter()
        .all(|(fb, textures)| *fb == shadow_fb && !textures.contains(&depth)));
    assert!(main
        .iter()
        .all(|(fb, textures)| *fb == main_fb && textures.contains(&depth)));
}

#[test]
fn test_frame_ends_on_screen_and_resets_shadow_map() {
    let mut f = fixture();
    let target = AntiAliasing::None.build(&f.device, 64, 48).unwrap();
    f.gpu.clear_events();

    f.frame(target.as_ref(), false).unwrap();

    let events = f.gpu.events();
    let last = events
        .iter()
        .rev()
        .find(|e| e.written_framebuffer().is_some())
        .unwrap();
    match last {
        GpuEvent::Blit(desc) => {
            assert_eq!(desc.src, target.framebuffer());
            assert_eq!(desc.dst, None);
            assert_eq!((desc.dst_rect.width, desc.dst_rect.height), (64, 48));
        }
        other => panic!("expected a blit to the screen, got {other:?}"),
    }
    assert_eq!(f.sun.shadow_map().unwrap().pass(), ShadowPass::Idle);
}

#[test]
fn test_every_strategy_presents_the_frame() {
    for aa in ["none", "ssaa:2", "msaa:4", "fxaa2"] {
        let mut f = fixture();
        let target = aa
            .parse::<AntiAliasing>()
            .unwrap()
            .build(&f.device, 64, 48)
            .unwrap();
        f.gpu.clear_events();

        f.frame(target.as_ref(), false).unwrap();

        let events = f.gpu.events();
        let last = events
            .iter()
            .rev()
            .find_map(|e| e.written_framebuffer())
            .unwrap();
        assert_eq!(last, None, "{aa} did not end on the screen");
        assert!(f.gpu.violations().is_empty(), "{aa}: {:?}", f.gpu.violations());
    }
}

#[test]
fn test_consecutive_frames() {
    let mut f = fixture();
    let target = AntiAliasing::Fxaa2.build(&f.device, 64, 48).unwrap();
    f.frame(target.as_ref(), false).unwrap();
    f.frame(target.as_ref(), false).unwrap();
    assert_eq!(f.sun.shadow_map().unwrap().pass(), ShadowPass::Idle);
}

#[test]
fn test_bounding_boxes_follow_lit_pass() {
    let mut f = fixture();
    let target = AntiAliasing::None.build(&f.device, 64, 48).unwrap();
    f.gpu.clear_events();

    f.frame(target.as_ref(), true).unwrap();

    let main_fb = Some(target.framebuffer());
    let primitives: Vec<Primitive> = f
        .gpu
        .events()
        .into_iter()
        .filter_map(|e| match e {
            GpuEvent::Draw {
                framebuffer,
                primitive,
                ..
            } if framebuffer == main_fb => Some(primitive),
            _ => None,
        })
        .collect();
    assert_eq!(
        primitives,
        vec![
            Primitive::Triangles,
            Primitive::Triangles,
            Primitive::Lines,
            Primitive::Lines,
            Primitive::Lines,
            Primitive::Lines,
        ]
    );
}

#[test]
fn test_frame_without_shadow_map_writes_nothing() {
    let mut f = fixture();
    f.sun = DirectLight::new(Vec3::ONE, Vec3::ONE, Vec3::ONE, Vec3::Y);
    let target = AntiAliasing::None.build(&f.device, 64, 48).unwrap();
    f.gpu.clear_events();

    let err = f.frame(target.as_ref(), false).unwrap_err();
    assert!(matches!(err, RendererError::ShadowMapNotReady));
    assert!(f
        .gpu
        .events()
        .iter()
        .all(|e| e.written_framebuffer().is_none()));
}
