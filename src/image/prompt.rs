//! Prompt text for the composition edit.

use crate::image::types::CompositionConfig;

const COMPOSITION_PROMPT: &str = "\
Act as a professional photo retoucher specialized in compositing.

You are given two images:
1. The first image is the BACKDROP (background scene).
2. The second image contains the SUBJECT (a person or object).

Your task:
1. Cleanly cut out the subject from the second image, removing its original background completely.
2. Place the cut-out subject onto the BACKDROP realistically.
3. Composition adjustments (crucial):
   - Match the subject's color temperature to the backdrop.
   - Adjust the subject's exposure, contrast and black levels so it belongs in the scene.
   - Generate realistic contact shadows and cast shadows that follow the light direction of the backdrop.";

const RETURN_ONLY_IMAGE: &str = "Return ONLY the final composited image in high quality.";

/// Builds the instruction text sent alongside the two images.
///
/// The adjustment flags on `config` are not consulted.
pub fn composition_prompt(config: &CompositionConfig) -> String {
    let mut prompt = String::from(COMPOSITION_PROMPT);
    prompt.push_str("\n\n");

    if let Some(instruction) = config.instruction.as_deref().filter(|i| !i.is_empty()) {
        prompt.push_str(&format!("Additional user instruction: \"{instruction}\"\n\n"));
    }

    prompt.push_str(RETURN_ONLY_IMAGE);
    prompt
}
