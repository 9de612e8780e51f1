use crate::renderer::gltf::{
    self, Accessor, AccessorKind, BufferView, ComponentType, Filter, Material, NodeTransform,
    SceneDescription, TextureRef, Topology, Wrap,
};
use anyhow::{bail, ensure, Context};
use base64::Engine;
use glam::{Mat4, Quat, Vec3, Vec4};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tinyjson::JsonValue;

type JsonObject = HashMap<String, JsonValue>;

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_CHUNK_JSON: u32 = 0x4E4F534A;
const GLB_CHUNK_BIN: u32 = 0x004E4942;

/// Loads a .gltf or .glb file, resolving external resources relative to the
/// file's directory.
pub fn load_gltf_file(path: &Path) -> anyhow::Result<SceneDescription> {
    let bytes = fs::read(path).with_context(|| format!("could not read {}", path.display()))?;
    let base_dir = path.parent().unwrap_or(Path::new("."));
    let resolve = |uri: &str| {
        let resource_path = base_dir.join(uri);
        fs::read(&resource_path)
            .with_context(|| format!("could not read resource {}", resource_path.display()))
    };
    if bytes.starts_with(GLB_MAGIC) {
        let (json, bin) = split_glb(&bytes)?;
        load_gltf(json, bin, resolve)
    } else {
        let json = std::str::from_utf8(&bytes).context("glTF JSON is not valid UTF-8")?;
        load_gltf(json, None, resolve)
    }
}

/// Parses glTF JSON into a [`SceneDescription`]. `glb_bin` is the BIN chunk of
/// a GLB container, used for the first buffer when it has no uri. Every other
/// resource is requested from `resolve` by its uri.
pub fn load_gltf(
    gltf: &str,
    glb_bin: Option<&[u8]>,
    mut resolve: impl FnMut(&str) -> anyhow::Result<Vec<u8>>,
) -> anyhow::Result<SceneDescription> {
    let gltf: JsonValue = gltf.parse().context("could not parse glTF JSON")?;
    let gltf = object(&gltf, "glTF root")?;

    let mut buffers = Vec::new();
    for (i, buffer) in array(gltf, "buffers")?.iter().enumerate() {
        let buffer = object(buffer, "buffer")?;
        let byte_length = take_usize(field(buffer, "byteLength")?)?;
        let mut data = match buffer.get("uri") {
            Some(uri) => read_uri(take_str(uri)?, &mut resolve)?,
            // The BIN chunk of GLBs
            None if i == 0 => glb_bin
                .context("buffer 0 has no uri and there is no GLB BIN chunk")?
                .to_vec(),
            None => bail!("buffer {i} has no uri"),
        };
        ensure!(
            data.len() >= byte_length,
            "buffer {i} is {} bytes, but declares a byteLength of {byte_length}",
            data.len(),
        );
        data.truncate(byte_length);
        buffers.push(data);
    }

    let mut buffer_views = Vec::new();
    for buffer_view in array(gltf, "bufferViews")? {
        let buffer_view = object(buffer_view, "buffer view")?;
        buffer_views.push(BufferView {
            buffer: take_usize(field(buffer_view, "buffer")?)?,
            byte_offset: optional_usize(buffer_view, "byteOffset")?.unwrap_or(0),
            byte_length: take_usize(field(buffer_view, "byteLength")?)?,
            byte_stride: optional_usize(buffer_view, "byteStride")?.unwrap_or(0),
        });
    }

    let mut accessors = Vec::new();
    for accessor in array(gltf, "accessors")? {
        let accessor = object(accessor, "accessor")?;
        let component_type = take_usize(field(accessor, "componentType")?)?;
        let kind = take_str(field(accessor, "type")?)?;
        accessors.push(Accessor {
            buffer_view: optional_usize(accessor, "bufferView")?,
            byte_offset: optional_usize(accessor, "byteOffset")?.unwrap_or(0),
            component_type: ComponentType::from_gltf(component_type)
                .with_context(|| format!("unexpected accessor componentType {component_type}"))?,
            kind: AccessorKind::from_gltf(kind)
                .with_context(|| format!("unexpected accessor type \"{kind}\""))?,
            count: take_usize(field(accessor, "count")?)?,
            normalized: accessor.get("normalized").map(take_bool).transpose()?.unwrap_or(false),
            min: accessor.get("min").map(take_floats).transpose()?,
            max: accessor.get("max").map(take_floats).transpose()?,
        });
    }

    let mut images = Vec::new();
    for (i, image_json) in array(gltf, "images")?.iter().enumerate() {
        let image_json = object(image_json, "image")?;
        let encoded = if let Some(uri) = image_json.get("uri") {
            read_uri(take_str(uri)?, &mut resolve)?
        } else {
            let view_index = optional_usize(image_json, "bufferView")?
                .with_context(|| format!("image {i} has neither a uri nor a bufferView"))?;
            let view = buffer_views
                .get(view_index)
                .with_context(|| format!("image {i} refers to missing buffer view {view_index}"))?;
            let buffer = buffers
                .get(view.buffer)
                .with_context(|| format!("buffer view {view_index} refers to missing buffer"))?;
            let end = view.byte_offset.checked_add(view.byte_length);
            end.and_then(|end| buffer.get(view.byte_offset..end))
                .with_context(|| format!("buffer view {view_index} is out of its buffer's bounds"))?
                .to_vec()
        };
        let decoded = image::load_from_memory(&encoded)
            .with_context(|| format!("could not decode image {i}"))?
            .into_rgba8();
        images.push(gltf::Image {
            width: decoded.width(),
            height: decoded.height(),
            pixels: decoded.into_raw(),
        });
    }

    let mut samplers = Vec::new();
    for sampler in array(gltf, "samplers")? {
        let sampler = object(sampler, "sampler")?;
        let filter = |key: &str, default: Filter| -> anyhow::Result<Filter> {
            match optional_usize(sampler, key)? {
                Some(value) => Filter::from_gltf(value)
                    .with_context(|| format!("unexpected sampler {key} {value}")),
                None => Ok(default),
            }
        };
        let wrap = |key: &str| -> anyhow::Result<Wrap> {
            match optional_usize(sampler, key)? {
                Some(value) => {
                    Wrap::from_gltf(value).with_context(|| format!("unexpected sampler {key} {value}"))
                }
                None => Ok(Wrap::Repeat),
            }
        };
        samplers.push(gltf::Sampler {
            min_filter: filter("minFilter", Filter::Linear)?,
            mag_filter: filter("magFilter", Filter::Linear)?,
            wrap_s: wrap("wrapS")?,
            wrap_t: wrap("wrapT")?,
        });
    }

    let mut textures = Vec::new();
    for texture in array(gltf, "textures")? {
        let texture = object(texture, "texture")?;
        textures.push(gltf::Texture {
            source: optional_usize(texture, "source")?,
            sampler: optional_usize(texture, "sampler")?,
        });
    }

    let mut materials = Vec::new();
    for material in array(gltf, "materials")? {
        materials.push(parse_material(object(material, "material")?)?);
    }

    let mut meshes = Vec::new();
    for mesh in array(gltf, "meshes")? {
        let mesh = object(mesh, "mesh")?;
        let mut primitives = Vec::new();
        for primitive in array(mesh, "primitives")? {
            let primitive = object(primitive, "primitive")?;
            let mut attributes = BTreeMap::new();
            for (semantic, accessor) in object(field(primitive, "attributes")?, "attributes")? {
                attributes.insert(semantic.clone(), take_usize(accessor)?);
            }
            let mode = optional_usize(primitive, "mode")?.unwrap_or(4);
            primitives.push(gltf::Primitive {
                attributes,
                indices: optional_usize(primitive, "indices")?,
                mode: Topology::from_gltf(mode)
                    .with_context(|| format!("unexpected primitive mode {mode}"))?,
                material_index: optional_usize(primitive, "material")?,
            });
        }
        meshes.push(gltf::Mesh { primitives });
    }

    let mut nodes = Vec::new();
    for node in array(gltf, "nodes")? {
        let node = object(node, "node")?;
        let child_node_indices = array(node, "children")?
            .iter()
            .map(take_usize)
            .collect::<anyhow::Result<Vec<_>>>()?;
        let transform = if let Some(matrix_values) = node.get("matrix") {
            let matrix = take_floats(matrix_values)?;
            ensure!(matrix.len() == 16, "node matrix must have 16 values");
            NodeTransform::Matrix(Mat4::from_cols_slice(&matrix))
        } else {
            NodeTransform::Trs {
                translation: node.get("translation").map(take_vec3).transpose()?.unwrap_or(Vec3::ZERO),
                rotation: node.get("rotation").map(take_quat).transpose()?.unwrap_or(Quat::IDENTITY),
                scale: node.get("scale").map(take_vec3).transpose()?.unwrap_or(Vec3::ONE),
            }
        };
        nodes.push(gltf::Node {
            mesh_index: optional_usize(node, "mesh")?,
            child_node_indices,
            transform,
        });
    }

    let mut scenes = Vec::new();
    for scene in array(gltf, "scenes")? {
        let node_indices = array(object(scene, "scene")?, "nodes")?
            .iter()
            .map(take_usize)
            .collect::<anyhow::Result<Vec<_>>>()?;
        scenes.push(gltf::Scene { node_indices });
    }

    // Without a "scene", show the first one rather than nothing.
    let default_scene = optional_usize(gltf, "scene")?.or((!scenes.is_empty()).then_some(0));
    Ok(SceneDescription {
        default_scene,
        scenes,
        nodes,
        meshes,
        materials,
        textures,
        images,
        samplers,
        accessors,
        buffer_views,
        buffers,
    })
}

fn parse_material(material: &JsonObject) -> anyhow::Result<Material> {
    let mut result = Material::default();
    if let Some(pbr) = material.get("pbrMetallicRoughness") {
        let pbr = object(pbr, "pbrMetallicRoughness")?;
        if let Some(factor) = pbr.get("baseColorFactor") {
            let factor = take_floats(factor)?;
            ensure!(factor.len() == 4, "baseColorFactor must have 4 values");
            result.base_color_factor = Vec4::from_slice(&factor);
        }
        result.base_color_texture = pbr.get("baseColorTexture").map(take_texture_ref).transpose()?;
        if let Some(metallic) = pbr.get("metallicFactor") {
            result.metallic_factor = take_f32(metallic)?;
        }
        if let Some(roughness) = pbr.get("roughnessFactor") {
            result.roughness_factor = take_f32(roughness)?;
        }
        result.metallic_roughness_texture = pbr
            .get("metallicRoughnessTexture")
            .map(take_texture_ref)
            .transpose()?;
    }
    if let Some(factor) = material.get("emissiveFactor") {
        result.emissive_factor = take_vec3(factor)?;
    }
    result.emissive_texture = material.get("emissiveTexture").map(take_texture_ref).transpose()?;
    if let Some(occlusion) = material.get("occlusionTexture") {
        result.occlusion_texture = Some(take_texture_ref(occlusion)?);
        if let Some(strength) = object(occlusion, "occlusionTexture")?.get("strength") {
            result.occlusion_strength = take_f32(strength)?;
        }
    }
    if let Some(normal) = material.get("normalTexture") {
        result.normal_texture = Some(take_texture_ref(normal)?);
        if let Some(scale) = object(normal, "normalTexture")?.get("scale") {
            result.normal_scale = take_f32(scale)?;
        }
    }
    Ok(result)
}

fn read_uri(
    uri: &str,
    resolve: &mut impl FnMut(&str) -> anyhow::Result<Vec<u8>>,
) -> anyhow::Result<Vec<u8>> {
    let Some(data) = uri.strip_prefix("data:") else {
        return resolve(uri);
    };
    let (media_type, payload) = data.split_once(',').context("data uri has no payload")?;
    ensure!(
        media_type.ends_with(";base64"),
        "only base64 data uris are supported, got \"data:{media_type}\""
    );
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .context("data uri payload is not valid base64")
}

/// Splits a GLB container into its JSON chunk and optional BIN chunk.
fn split_glb(glb: &[u8]) -> anyhow::Result<(&str, Option<&[u8]>)> {
    let read_u32 = |offset: usize| -> anyhow::Result<u32> {
        let bytes = glb.get(offset..offset + 4).context("truncated GLB")?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    };
    ensure!(glb.starts_with(GLB_MAGIC), "not a GLB file");
    let version = read_u32(4)?;
    ensure!(version == 2, "unsupported GLB version {version}");
    let total_length = (read_u32(8)? as usize).min(glb.len());

    let mut json = None;
    let mut bin = None;
    let mut offset = 12;
    while offset + 8 <= total_length {
        let chunk_length = read_u32(offset)? as usize;
        let chunk_type = read_u32(offset + 4)?;
        let chunk = glb
            .get(offset + 8..offset + 8 + chunk_length)
            .context("GLB chunk extends past the end of the file")?;
        match chunk_type {
            GLB_CHUNK_JSON if json.is_none() => {
                json = Some(std::str::from_utf8(chunk).context("GLB JSON chunk is not valid UTF-8")?);
            }
            GLB_CHUNK_BIN if bin.is_none() => bin = Some(chunk),
            _ => {} // Unknown chunks must be ignored.
        }
        offset += 8 + chunk_length;
    }
    Ok((json.context("GLB has no JSON chunk")?, bin))
}

fn object<'a>(json_value: &'a JsonValue, what: &str) -> anyhow::Result<&'a JsonObject> {
    json_value
        .get::<JsonObject>()
        .with_context(|| format!("expected {what} to be a JSON object"))
}

fn field<'a>(object: &'a JsonObject, key: &str) -> anyhow::Result<&'a JsonValue> {
    object
        .get(key)
        .with_context(|| format!("missing required property \"{key}\""))
}

/// Returns the array under `key`, or an empty slice if the key is absent.
fn array<'a>(object: &'a JsonObject, key: &str) -> anyhow::Result<&'a [JsonValue]> {
    match object.get(key) {
        Some(value) => value
            .get::<Vec<JsonValue>>()
            .map(Vec::as_slice)
            .with_context(|| format!("expected \"{key}\" to be an array")),
        None => Ok(&[]),
    }
}

fn optional_usize(object: &JsonObject, key: &str) -> anyhow::Result<Option<usize>> {
    object.get(key).map(take_usize).transpose()
}

fn take_usize(json_value: &JsonValue) -> anyhow::Result<usize> {
    let number: &f64 = json_value.get().context("expected a number")?;
    ensure!(
        *number >= 0.0 && number.fract() == 0.0 && *number < usize::MAX as f64,
        "expected a non-negative integer, got {number}"
    );
    Ok(*number as usize)
}

fn take_f32(json_value: &JsonValue) -> anyhow::Result<f32> {
    let number: &f64 = json_value.get().context("expected a number")?;
    Ok(*number as f32)
}

fn take_bool(json_value: &JsonValue) -> anyhow::Result<bool> {
    json_value.get::<bool>().copied().context("expected a boolean")
}

fn take_str(json_value: &JsonValue) -> anyhow::Result<&str> {
    json_value
        .get::<String>()
        .map(String::as_str)
        .context("expected a string")
}

fn take_floats(json_value: &JsonValue) -> anyhow::Result<Vec<f32>> {
    let values: &Vec<JsonValue> = json_value.get().context("expected an array of numbers")?;
    values.iter().map(take_f32).collect()
}

fn take_vec3(json_value: &JsonValue) -> anyhow::Result<Vec3> {
    let values = take_floats(json_value)?;
    ensure!(values.len() == 3, "expected 3 numbers, got {}", values.len());
    Ok(Vec3::from_slice(&values))
}

fn take_quat(json_value: &JsonValue) -> anyhow::Result<Quat> {
    let values = take_floats(json_value)?;
    ensure!(values.len() == 4, "expected 4 numbers, got {}", values.len());
    Ok(Quat::from_xyzw(values[0], values[1], values[2], values[3]))
}

fn take_texture_ref(json_value: &JsonValue) -> anyhow::Result<TextureRef> {
    let texture_info = object(json_value, "texture info")?;
    Ok(TextureRef {
        index: take_usize(field(texture_info, "index")?)?,
        tex_coord: optional_usize(texture_info, "texCoord")?.unwrap_or(0),
    })
}
