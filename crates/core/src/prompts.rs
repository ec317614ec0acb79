/// Sentence the model is told to give when the context does not support an answer.
pub const NOT_FOUND_SENTINEL: &str = "The answer was not found in the document.";

pub const IMAGE_EMPTY_MESSAGE: &str = "No clear text could be extracted from the image.";

/// Prompt for OCR text. The whole extraction goes in; images are short and
/// their layout rarely survives chunking.
pub fn image_prompt(ocr_text: &str, question: &str) -> String {
    format!(
        "You are an expert document and image analyst. Your job is to accurately read and \
interpret the content from the extracted OCR text below.

Extracted Text from Image:
{ocr_text}

User Question: {question}

Instructions:
- Answer directly and clearly based only on the visible text in the image.
- If asked for names, list all visible names.
- If asked to count something, give exact counts.
- If it's a table, extract it properly.
- If it's a form, screenshot, or handwritten text, do your best to interpret it.
- Be concise and professional.

Answer:"
    )
}

pub fn rag_prompt(chunks: &[&str], question: &str) -> String {
    let context = chunks.join("\n\n");
    format!(
        "You are a precise enterprise document assistant.
Use ONLY the provided context to answer the question.
If the context does not contain the answer, reply exactly: \"{NOT_FOUND_SENTINEL}\"
Be direct, professional, and accurate.

Context:
{context}

Question: {question}

Answer:"
    )
}
