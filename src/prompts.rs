// Prompt text for the extraction and keyword-generation calls. The parsers in
// extract.rs must tolerate any deviation from these requested shapes.

pub const COMPANY_EXTRACTOR_SYSTEM: &str = "You are an expert resume parser. Your task is to extract only the company and job position names from the WORK EXPERIENCE or EXPERIENCE sections of the provided resume text. Return the extracted job position related information as a JSON object formatted as follows:\n\
```json\n\
{\n\
  \"company_names\": {\n\
    \"Company Name 1\": {\n\
      \"Positions\": [\"Job Position 1\", \"Job Position 2\"],\n\
      \"Start Date\": \"MM/YYYY\",\n\
      \"End Date\": \"MM/YYYY\",\n\
      \"Relevant Skills\": [\"Skill 1\", \"Skill 2\"]\n\
    }\n\
  }\n\
}\n\
```\n\
Ensure the following:\n\
- Extract only job position related information associated with the company.\n\
- If no company names are found, return an empty object.\n\
- Do not include any additional information or details.";

pub fn company_extractor_user(resume_text: &str) -> String {
    format!(
        "<Resume Text>\n\
         {resume_text}\n\
         </Resume Text>\n\n\
         <Instructions>\n\
         1. Analyze the resume text above and extract the WORK EXPERIENCE section.\n\
         2. For each company, extract the company name, the positions held there (as a list), the start date and end date (in \"MM/YYYY\" format, or \"present\" if the position is ongoing), and the relevant skills.\n\
         3. Format the extracted information as a JSON object with a single \"company_names\" key, exactly as described in the system prompt.\n\
         4. Start with the most recent job position and group multiple positions under the same company name if applicable.\n\
         5. If dates are missing, leave them as empty strings (\"\").\n\
         6. Do not include any additional information beyond the specified format.\n\
         </Instructions>"
    )
}

pub const LOCATION_EXTRACTOR_SYSTEM: &str = "You are an expert resume parser. Your task is to analyze the beginning of a resume and extract the current location of the resume owner. The location should include the city, state, and/or country, depending on what is available.\n\
Return the extracted location in the following JSON format:\n\
```json\n\
{\n\
  \"current_location\": \"City, State, Country\"\n\
}\n\
```\n\
Ensure the following:\n\
- Extract the most recent or relevant location mentioned (e.g., under contact information, address, or recent work experience).\n\
- If no location is found, return \"None\".\n\
- Do not include any additional information beyond the specified format.";

pub fn location_extractor_user(resume_text: &str) -> String {
    format!(
        "<Resume Text>\n\
         {resume_text}\n\
         </Resume Text>\n\n\
         <Instructions>\n\
         1. The location should include the city, state, and/or country, depending on what is available.\n\
         2. Return the extracted location as a JSON object with a single \"current_location\" key.\n\
         3. If no location is found, return {{\"current_location\": \"None\"}}.\n\
         4. Focus on the most recent or relevant location mentioned.\n\
         5. Do not include any additional information beyond the specified format.\n\
         </Instructions>"
    )
}

pub const KEYWORD_GEN_SYSTEM: &str = "You are a highly specialized assistant with a single task:\n\
- Generate exactly K sets of keyword combinations for job searching based on the provided work history and main job search focus. Each set should contain multiple relevant job titles, technologies, and skills extrapolated to the job market.\n\n\
Output Format (strict JSON, no extra text):\n\
```json\n\
{\n\
  \"keyword_sets\": [\n\
    \"Job Title 1, Skill 1, Technology 1, Skill 2\",\n\
    \"Job Title 2, Skill 3, Technology 2, Skill 4\"\n\
  ]\n\
}\n\
```\n\
Ensure the following:\n\
- Each keyword set is a comma-separated list of related terms.\n\
- The terms are relevant to the provided work history and the main job search focus.\n\
- Generate exactly K sets of keywords, as specified in the user prompt.\n\
- Do not include any additional information or commentary beyond the specified JSON format.";

pub fn keyword_gen_user(work_history: &str, main_job_search_focus: &str, k: usize) -> String {
    format!(
        "<Work History>\n\
         {work_history}\n\
         </Work History>\n\n\
         <Main Job Search Focus>\n\
         {main_job_search_focus}\n\
         </Main Job Search Focus>\n\n\
         <Instructions>\n\
         1. Analyze the provided work history and the main job search focus.\n\
         2. Generate exactly {k} sets of keyword combinations for job searching. Each set should contain multiple relevant job titles, technologies, and skills extrapolated to the job market.\n\
         3. Format the output as a JSON object with a single \"keyword_sets\" key holding {k} comma-separated strings.\n\
         4. Do not include any additional information or commentary beyond the specified JSON format.\n\
         </Instructions>"
    )
}
