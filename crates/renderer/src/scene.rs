use glam::{Mat4, Vec3};

use crate::camera::{CameraInput, OrbitCamera};
use crate::clock::Tick;
use crate::error::RenderError;
use crate::portal::{Portal, PortalDraw, RotationMode};
use crate::post::{BloomParams, PassDescriptor, PassParams, PassRegistry, PostPass};

pub const AMBIENT_INTENSITY: f32 = 0.5;
pub const POINT_LIGHT_POSITION: Vec3 = Vec3::new(10.0, 10.0, 10.0);
pub const POINT_LIGHT_INTENSITY: f32 = 1.0;

/// Light sources placed in the scene. The portal program is unlit, so these
/// only matter to lit nodes; they are kept so the node list matches the scene
/// as authored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Ambient { intensity: f32 },
    Point { position: Vec3, intensity: f32 },
}

#[derive(Debug, Clone)]
pub enum SceneNode {
    Light(Light),
    Portal(Portal),
}

/// Inputs needed to assemble a [`Scene`].
#[derive(Debug, Clone, PartialEq)]
pub struct SceneOptions {
    pub rotation: RotationMode,
    pub passes: Vec<PassDescriptor>,
}

impl SceneOptions {
    pub fn with_bloom(rotation: RotationMode, bloom: BloomParams) -> Self {
        Self {
            rotation,
            passes: vec![PassDescriptor::bloom(bloom)],
        }
    }
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self::with_bloom(RotationMode::default(), BloomParams::default())
    }
}

/// Everything a backend needs to draw one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameState {
    pub view: Mat4,
    pub projection: Mat4,
    pub portals: Vec<PortalDraw>,
}

/// Lights, the portal, the post-processing chain and the camera.
///
/// Construction either yields a complete scene or fails; nothing is drawn from
/// a half-built one.
#[derive(Debug)]
pub struct Scene {
    nodes: Vec<SceneNode>,
    passes: Vec<Box<dyn PostPass>>,
    camera: OrbitCamera,
}

impl Scene {
    pub fn new(options: &SceneOptions, registry: &PassRegistry) -> Result<Self, RenderError> {
        let passes = options
            .passes
            .iter()
            .map(|descriptor| registry.build(descriptor))
            .collect::<Result<Vec<_>, _>>()?;

        let nodes = vec![
            SceneNode::Light(Light::Ambient {
                intensity: AMBIENT_INTENSITY,
            }),
            SceneNode::Light(Light::Point {
                position: POINT_LIGHT_POSITION,
                intensity: POINT_LIGHT_INTENSITY,
            }),
            SceneNode::Portal(Portal::new(options.rotation)),
        ];

        tracing::debug!(
            nodes = nodes.len(),
            passes = ?passes.iter().map(|pass| pass.kind()).collect::<Vec<_>>(),
            rotation = ?options.rotation,
            "assembled scene"
        );

        Ok(Self {
            nodes,
            passes,
            camera: OrbitCamera::default(),
        })
    }

    /// Per-tick callback body: advances every animated node.
    pub fn update(&mut self, tick: Tick) {
        for node in &mut self.nodes {
            if let SceneNode::Portal(portal) = node {
                portal.update(tick);
            }
        }
    }

    pub fn handle_input(&mut self, input: CameraInput, viewport_height: u32) -> bool {
        self.camera.handle_input(input, viewport_height)
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.camera.set_viewport(width, height);
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn lights(&self) -> impl Iterator<Item = &Light> {
        self.nodes.iter().filter_map(|node| match node {
            SceneNode::Light(light) => Some(light),
            SceneNode::Portal(_) => None,
        })
    }

    pub fn portals(&self) -> impl Iterator<Item = &Portal> {
        self.nodes.iter().filter_map(|node| match node {
            SceneNode::Portal(portal) => Some(portal),
            SceneNode::Light(_) => None,
        })
    }

    pub fn passes(&self) -> &[Box<dyn PostPass>] {
        &self.passes
    }

    /// Parameters of the first bloom pass in the chain, if any.
    pub fn bloom_params(&self) -> Option<BloomParams> {
        self.passes.iter().find_map(|pass| match pass.params() {
            PassParams::Bloom(params) => Some(params),
        })
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn frame_state(&self) -> FrameState {
        FrameState {
            view: self.camera.view_matrix(),
            projection: self.camera.projection_matrix(),
            portals: self.portals().map(Portal::draw).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(index: u64, elapsed: f32) -> Tick {
        Tick {
            elapsed,
            delta: if index == 0 { 0.0 } else { 1.0 / 60.0 },
            index,
        }
    }

    #[test]
    fn scene_holds_two_lights_then_the_portal() {
        let scene = Scene::new(&SceneOptions::default(), &PassRegistry::with_builtin()).unwrap();
        assert!(matches!(
            scene.nodes()[0],
            SceneNode::Light(Light::Ambient { intensity }) if intensity == 0.5
        ));
        assert!(matches!(
            scene.nodes()[1],
            SceneNode::Light(Light::Point { position, intensity })
                if position == Vec3::splat(10.0) && intensity == 1.0
        ));
        assert!(matches!(scene.nodes()[2], SceneNode::Portal(_)));
        assert_eq!(scene.lights().count(), 2);
        assert_eq!(scene.portals().count(), 1);
        assert_eq!(scene.passes().len(), 1);
        assert_eq!(scene.bloom_params(), Some(BloomParams::default()));
    }

    #[test]
    fn draw_sees_the_time_of_the_current_tick() {
        let mut scene =
            Scene::new(&SceneOptions::default(), &PassRegistry::with_builtin()).unwrap();
        for (index, elapsed) in [0.0, 0.016, 0.033, 0.05].into_iter().enumerate() {
            scene.update(tick(index as u64, elapsed));
            let state = scene.frame_state();
            assert_eq!(state.portals.len(), 1);
            assert_eq!(state.portals[0].time, elapsed);
        }
    }

    #[test]
    fn negative_bloom_radius_constructs() {
        let options = SceneOptions::with_bloom(
            RotationMode::default(),
            BloomParams {
                radius: -0.5,
                ..BloomParams::default()
            },
        );
        let scene = Scene::new(&options, &PassRegistry::with_builtin()).unwrap();
        assert_eq!(scene.bloom_params().map(|params| params.radius), Some(-0.5));
    }

    #[test]
    fn unregistered_pass_aborts_construction() {
        let err = Scene::new(&SceneOptions::default(), &PassRegistry::new()).unwrap_err();
        assert!(matches!(err, RenderError::UnregisteredPass(_)));
    }

    #[test]
    fn zoom_and_pan_leave_the_camera_alone() {
        let mut scene =
            Scene::new(&SceneOptions::default(), &PassRegistry::with_builtin()).unwrap();
        let before = scene.camera().clone();
        assert!(!scene.handle_input(CameraInput::Zoom { delta: -2.0 }, 720));
        assert!(!scene.handle_input(CameraInput::Pan { dx: 5.0, dy: 5.0 }, 720));
        assert_eq!(scene.camera(), &before);

        assert!(scene.handle_input(CameraInput::Orbit { dx: 10.0, dy: 0.0 }, 720));
        assert_eq!(scene.camera().distance(), before.distance());
        assert_eq!(scene.camera().target(), before.target());
    }
}
